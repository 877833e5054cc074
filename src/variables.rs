//! Dashboard variable substitution.
//!
//! The planner only depends on [`VariableResolver`]; [`TemplateResolver`] is
//! the textual engine used by the service. It understands `$name`, `${name}`
//! and `[[name]]` placeholders plus the built-in interval and range variables.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::models::{DatasourceRef, Variable, VariableValue};
use crate::time_range::ResolvedRange;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\$\{(\w+)\}|\[\[(\w+)\]\]|\$(\w+)").unwrap();
}

/// Minimum `$__rate_interval`, in seconds.
const MIN_RATE_INTERVAL: i64 = 60;

/// Per-target context for expression substitution.
#[derive(Debug, Clone, Copy)]
pub struct ExprContext<'a> {
    pub dashboard_id: &'a str,
    pub range: ResolvedRange,
    pub step: i64,
    /// Overrides for repeated panels; they win over configured values.
    pub scoped_vars: Option<&'a HashMap<String, String>>,
}

pub trait VariableResolver: Send + Sync {
    /// Rewrites a panel datasource reference, possibly into a numeric id.
    fn resolve_datasource(
        &self,
        value: &DatasourceRef,
        variables: &[Variable],
        dashboard_id: &str,
    ) -> DatasourceRef;

    /// Rewrites a target expression before dispatch.
    fn resolve_expr(&self, expr: &str, variables: &[Variable], ctx: &ExprContext<'_>) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResolver;

impl TemplateResolver {
    pub fn new() -> Self {
        Self
    }
}

impl VariableResolver for TemplateResolver {
    fn resolve_datasource(
        &self,
        value: &DatasourceRef,
        variables: &[Variable],
        _dashboard_id: &str,
    ) -> DatasourceRef {
        match value {
            DatasourceRef::Id(_) => value.clone(),
            DatasourceRef::Name(text) => {
                let resolved = substitute(text, |name| configured_value(variables, name));
                match resolved.trim().parse::<i64>() {
                    Ok(id) => DatasourceRef::Id(id),
                    Err(_) => DatasourceRef::Name(resolved),
                }
            }
        }
    }

    fn resolve_expr(&self, expr: &str, variables: &[Variable], ctx: &ExprContext<'_>) -> String {
        substitute(expr, |name| {
            ctx.scoped_vars
                .and_then(|scoped| scoped.get(name).cloned())
                .or_else(|| builtin_value(name, ctx))
                .or_else(|| configured_value(variables, name))
        })
    }
}

fn substitute<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn builtin_value(name: &str, ctx: &ExprContext<'_>) -> Option<String> {
    let span = ctx.range.span();
    match name {
        "__interval" => Some(format!("{}s", ctx.step)),
        "__rate_interval" => Some(format!("{}s", ctx.step.saturating_mul(4).max(MIN_RATE_INTERVAL))),
        "__range" => Some(format!("{}s", span)),
        "__range_s" => Some(span.to_string()),
        "__range_ms" => Some(span.saturating_mul(1000).to_string()),
        _ => None,
    }
}

fn configured_value(variables: &[Variable], name: &str) -> Option<String> {
    let variable = variables.iter().find(|v| v.name == name)?;
    match variable.value.as_ref()? {
        VariableValue::Single(value) => Some(value.clone()),
        VariableValue::Multi(values) => match values.len() {
            0 => None,
            1 => Some(values[0].clone()),
            _ => Some(format!("({})", values.join("|"))),
        },
    }
}
