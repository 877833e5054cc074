//! Sampling interval ("step") resolution for range queries.

use chrono::{DateTime, Utc};

use crate::models::{Target, TimeRange};
use crate::time_range::{self, ResolvedRange};
use crate::Result;

pub const DEFAULT_MAX_DATA_POINTS: i64 = 240;

/// Upper bound on points per series enforced by the query backend.
pub const MAX_POINTS_PER_SERIES: i64 = 11_000;

/// `floor(span / max_data_points)`, never below 1.
pub fn default_step(range: ResolvedRange, max_data_points: Option<i64>) -> i64 {
    let max_data_points = max_data_points
        .filter(|points| *points > 0)
        .unwrap_or(DEFAULT_MAX_DATA_POINTS);
    (range.span().div_euclid(max_data_points)).max(1)
}

/// Smallest step that keeps a window of `span` seconds under the point limit.
pub fn safety_step(span: i64) -> i64 {
    if span > MAX_POINTS_PER_SERIES {
        (span + MAX_POINTS_PER_SERIES - 1) / MAX_POINTS_PER_SERIES
    } else {
        // span / limit is at most 1 here, so it can never raise the step.
        0
    }
}

/// Combines a computed step with a declared minimum.
pub fn adjust_step(step: i64, min_step: i64, span: i64) -> i64 {
    step.max(min_step).max(safety_step(span)).max(1)
}

/// Resolves the effective step for `target` within the panel window `time`.
///
/// A target level `time` window replaces the panel window when computing the
/// default step, while the point limit is always checked against the panel
/// window. A declared `step` of zero counts as unset.
pub fn resolve_step(time: &TimeRange, target: &Target, now: DateTime<Utc>) -> Result<i64> {
    let panel = time_range::resolve(time, now)?;
    resolve_step_in(panel, time_range_of(target, now)?, target)
}

/// Same as [`resolve_step`] with the panel window already resolved.
pub fn resolve_step_in(
    panel: ResolvedRange,
    target_window: Option<ResolvedRange>,
    target: &Target,
) -> Result<i64> {
    let mut step = default_step(target_window.unwrap_or(panel), target.max_data_points);
    if let Some(declared) = target.step.filter(|s| *s > 0) {
        step = adjust_step(step, declared, panel.span());
    }
    Ok(step)
}

/// The target's own window, when it declares one with a start bound.
pub fn time_range_of(target: &Target, now: DateTime<Utc>) -> Result<Option<ResolvedRange>> {
    match &target.time {
        Some(window) if window.has_start() => time_range::resolve(window, now).map(Some),
        _ => Ok(None),
    }
}
