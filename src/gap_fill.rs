use crate::models::Sample;

/// Step used for gap filling when the originating target is unknown.
pub const FALLBACK_STEP: i64 = 15;

/// Inserts `[t, null]` samples on the `step` grid wherever consecutive
/// samples are further apart than `step`, so renderers break the line
/// instead of interpolating across missing data.
pub fn complete_breakpoints(step: i64, samples: Vec<Sample>) -> Vec<Sample> {
    if step <= 0 || samples.len() < 2 {
        return samples;
    }
    let step = step as f64;

    let mut completed = Vec::with_capacity(samples.len());
    let mut prev: Option<f64> = None;
    for sample in samples {
        if let Some(prev_ts) = prev {
            if sample.timestamp() - prev_ts > step {
                let mut ts = prev_ts + step;
                while ts < sample.timestamp() {
                    completed.push(Sample::gap(ts));
                    ts += step;
                }
            }
        }
        prev = Some(sample.timestamp());
        completed.push(sample);
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(ts: f64, v: &str) -> Sample {
        Sample::new(ts, v)
    }

    #[test]
    fn test_single_missing_sample() {
        let data = vec![s(0.0, "1"), s(10.0, "2"), s(30.0, "4")];
        let filled = complete_breakpoints(10, data);
        assert_eq!(
            filled,
            vec![s(0.0, "1"), s(10.0, "2"), Sample::gap(20.0), s(30.0, "4")]
        );
    }

    #[test]
    fn test_wide_gap() {
        let filled = complete_breakpoints(15, vec![s(100.0, "1"), s(175.0, "2")]);
        let gaps: Vec<f64> = filled.iter().filter(|x| x.is_gap()).map(Sample::timestamp).collect();
        assert_eq!(gaps, vec![115.0, 130.0, 145.0, 160.0]);
        assert_eq!(filled.len(), 6);
    }

    #[test]
    fn test_contiguous_data_untouched() {
        let contiguous = vec![s(0.0, "1"), s(10.0, "2"), s(20.0, "3")];
        assert_eq!(complete_breakpoints(10, contiguous.clone()), contiguous);
    }

    #[test]
    fn test_late_sample_opens_gap() {
        let filled = complete_breakpoints(10, vec![s(0.0, "1"), s(10.5, "2")]);
        assert_eq!(filled, vec![s(0.0, "1"), Sample::gap(10.0), s(10.5, "2")]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(complete_breakpoints(10, vec![]).is_empty());
        let one = vec![s(5.0, "1")];
        assert_eq!(complete_breakpoints(10, one.clone()), one);
        let two = vec![s(0.0, "1"), s(100.0, "2")];
        assert_eq!(complete_breakpoints(0, two.clone()), two);
    }
}
