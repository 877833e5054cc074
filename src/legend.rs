use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::models::Labels;

lazy_static! {
    static ref LEGEND_PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").unwrap();
}

/// Replaces each `{{ label }}` in `template` with its value, or nothing when absent.
pub fn substitute_legend(template: &str, labels: &Labels) -> String {
    LEGEND_PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            labels.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Default display name: `metric{a="1", b="2"}`.
pub fn series_name(labels: &Labels) -> String {
    let name = labels.get("__name__").map(String::as_str).unwrap_or("");
    let rest: Vec<String> = labels
        .iter()
        .filter(|(key, _)| key.as_str() != "__name__")
        .map(|(key, value)| format!("{}=\"{}\"", key, value))
        .collect();

    if rest.is_empty() && !name.is_empty() {
        name.to_string()
    } else {
        format!("{}{{{}}}", name, rest.join(", "))
    }
}

/// Legend template when the target has a non-empty one, the default name otherwise.
pub fn display_name(legend: Option<&str>, labels: &Labels) -> String {
    match legend.filter(|l| !l.is_empty()) {
        Some(template) => substitute_legend(template, labels),
        None => series_name(labels),
    }
}
