//! Turns a panel's targets into at most two batched fetch calls and reshapes
//! the responses into named, gap-filled series.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::api_path;
use crate::gap_fill::{complete_breakpoints, FALLBACK_STEP};
use crate::legend::display_name;
use crate::metrics;
use crate::models::{
    BatchInstantParam, BatchPayload, BatchRangeParam, BatchResponse, InspectEntry, InspectKind,
    InspectRequest, Labels, QueryOptions, QueryResult, RawSeriesResult, Sample, Series, Target,
};
use crate::ref_id::ref_id_for_index;
use crate::step;
use crate::time_range::{self, ResolvedRange};
use crate::transport::{QueryTransport, INSTANT_BATCH_PATH, RANGE_BATCH_PATH};
use crate::variables::{ExprContext, TemplateResolver, VariableResolver};
use crate::{DashQueryError, Result};

/// Panel types that legitimately have no datasource.
pub const NON_QUERY_PANEL_TYPES: &[&str] = &["text", "iframe"];

/// Request batches derived from one panel, before dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPlan {
    pub range: Vec<BatchRangeParam>,
    pub instant: Vec<BatchInstantParam>,
    pub signal_key: String,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.range.is_empty() && self.instant.is_empty()
    }
}

/// Copies `targets`, filling missing refIds by position.
pub fn assign_ref_ids(targets: &[Target]) -> Vec<Target> {
    targets
        .iter()
        .enumerate()
        .map(|(idx, target)| {
            let mut target = target.clone();
            if target.ref_id().is_none() {
                target.ref_id = Some(ref_id_for_index(idx));
            }
            target
        })
        .collect()
}

pub fn is_non_query_panel(panel_type: Option<&str>) -> bool {
    panel_type.map_or(false, |t| NON_QUERY_PANEL_TYPES.contains(&t))
}

fn series_id() -> String {
    format!("series_{}", Uuid::new_v4().simple())
}

fn find_target<'a>(targets: &'a [Target], ref_id: &str) -> Option<&'a Target> {
    targets.iter().find(|t| t.ref_id() == Some(ref_id))
}

pub struct QueryPlanner<T, V = TemplateResolver> {
    transport: T,
    resolver: V,
}

impl<T: QueryTransport> QueryPlanner<T, TemplateResolver> {
    pub fn with_transport(transport: T) -> Self {
        Self::new(transport, TemplateResolver::new())
    }
}

impl<T, V> QueryPlanner<T, V>
where
    T: QueryTransport,
    V: VariableResolver,
{
    pub fn new(transport: T, resolver: V) -> Self {
        Self {
            transport,
            resolver,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn query(&self, options: &QueryOptions) -> Result<QueryResult> {
        self.query_at(options, Utc::now()).await
    }

    /// Runs the panel query with relative bounds resolved against `now`.
    pub async fn query_at(&self, options: &QueryOptions, now: DateTime<Utc>) -> Result<QueryResult> {
        let _timer = metrics::QueryTimer::new();

        if !options.time.has_start() {
            return Ok(QueryResult::default());
        }
        let panel = time_range::resolve(&options.time, now)?;

        let datasource = match options.variable_config.as_deref() {
            Some(variables) => self.resolver.resolve_datasource(
                &options.datasource_value,
                variables,
                &options.dashboard_id,
            ),
            None => options.datasource_value.clone(),
        };
        let datasource_id = match datasource.as_id() {
            Some(id) => id,
            None if is_non_query_panel(options.panel_type.as_deref()) => {
                return Ok(QueryResult::default());
            }
            None => {
                return Err(DashQueryError::InvalidDatasource(format!(
                    "{:?} does not resolve to a datasource id",
                    options.datasource_value
                )));
            }
        };

        let targets = assign_ref_ids(&options.targets);
        let plan = self.plan(options, &targets, panel, now)?;
        debug!(
            range = plan.range.len(),
            instant = plan.instant.len(),
            "Planned batches for panel {}",
            options.id.as_deref().unwrap_or("-")
        );

        let mut series = Vec::new();
        let mut trace = Vec::new();
        let pathname = self.transport.pathname().to_string();

        if !plan.range.is_empty() {
            let payload = BatchPayload {
                queries: plan.range.clone(),
                datasource_id,
            };
            let response = dispatch(
                "range",
                self.transport.fetch_range_batch(&payload, &plan.signal_key),
            )
            .await?;
            if options.inspect {
                trace.push(inspect_entry(
                    InspectKind::QueryRange,
                    api_path(&pathname, RANGE_BATCH_PATH),
                    &payload,
                    &response,
                )?);
            }
            series.extend(reshape_range(options, &targets, &plan, response));
        }

        if !plan.instant.is_empty() {
            let payload = BatchPayload {
                queries: plan.instant.clone(),
                datasource_id,
            };
            let response = dispatch(
                "instant",
                self.transport.fetch_instant_batch(&payload, &plan.signal_key),
            )
            .await?;
            if options.inspect {
                trace.push(inspect_entry(
                    InspectKind::Query,
                    api_path(&pathname, INSTANT_BATCH_PATH),
                    &payload,
                    &response,
                )?);
            }
            series.extend(reshape_instant(&targets, &plan, response));
        }

        metrics::record_series(series.len());
        Ok(QueryResult {
            series,
            query: options.inspect.then_some(trace),
        })
    }

    /// Builds the request batches for `targets`, which must already carry refIds.
    pub fn plan(
        &self,
        options: &QueryOptions,
        targets: &[Target],
        panel: ResolvedRange,
        now: DateTime<Utc>,
    ) -> Result<BatchPlan> {
        let mut plan = BatchPlan {
            signal_key: options.id.clone().unwrap_or_default(),
            ..Default::default()
        };

        for target in targets {
            let ref_id = target.ref_id().unwrap_or_default().to_string();
            let target_window = step::time_range_of(target, now)?;
            let step = step::resolve_step_in(panel, target_window, target)?;

            let expr = match options.variable_config.as_deref() {
                Some(variables) => {
                    let ctx = ExprContext {
                        dashboard_id: &options.dashboard_id,
                        range: panel,
                        step,
                        scoped_vars: options.scoped_vars.as_ref(),
                    };
                    self.resolver.resolve_expr(&target.expr, variables, &ctx)
                }
                None => target.expr.clone(),
            };
            if expr.is_empty() {
                continue;
            }

            if target.instant {
                plan.instant.push(BatchInstantParam {
                    time: panel.end,
                    query: expr,
                    ref_id,
                });
            } else {
                plan.range.push(BatchRangeParam {
                    start: panel.start,
                    end: panel.end,
                    query: expr,
                    step,
                    ref_id,
                });
            }
            plan.signal_key.push('-');
            plan.signal_key.push_str(&target.expr);
        }

        Ok(plan)
    }
}

async fn dispatch<F>(kind: &str, call: F) -> Result<BatchResponse>
where
    F: Future<Output = Result<BatchResponse>>,
{
    metrics::record_batch_request(kind);
    call.await.map_err(|e| {
        metrics::record_transport_failure();
        error!("Failed to fetch {} batch: {}", kind, e);
        e
    })
}

fn inspect_entry<P: Serialize>(
    kind: InspectKind,
    url: String,
    payload: &BatchPayload<P>,
    response: &BatchResponse,
) -> Result<InspectEntry> {
    Ok(InspectEntry {
        kind,
        request: InspectRequest {
            url,
            method: "POST".to_string(),
            data: serde_json::to_value(payload)?,
        },
        response: serde_json::to_value(response)?,
    })
}

/// Pairs each response group with the request at the same index.
fn response_groups<'a, P: 'a>(
    response: BatchResponse,
    params: &'a [P],
) -> impl Iterator<Item = (Option<&'a P>, Vec<RawSeriesResult>)> + 'a {
    response
        .dat
        .into_iter()
        .enumerate()
        .map(move |(i, rows)| (params.get(i), rows))
}

/// `query` is the dispatched expression, used when no target matches.
fn build_series(
    ref_id: &str,
    target: Option<&Target>,
    query: &str,
    metric: Labels,
    data: Vec<Sample>,
) -> Series {
    Series {
        id: series_id(),
        ref_id: ref_id.to_string(),
        name: display_name(target.and_then(|t| t.legend.as_deref()), &metric),
        expr: target.map_or_else(|| query.to_string(), |t| t.expr.clone()),
        metric,
        data,
    }
}

fn reshape_range(
    options: &QueryOptions,
    targets: &[Target],
    plan: &BatchPlan,
    response: BatchResponse,
) -> Vec<Series> {
    let mut series = Vec::new();
    for (param, rows) in response_groups(response, &plan.range) {
        let ref_id = param.map_or("", |p| p.ref_id.as_str());
        let query = param.map_or("", |p| p.query.as_str());
        let target = find_target(targets, ref_id);
        // Duplicate refIds share a target but each group keeps its own step.
        let step = param.map_or(FALLBACK_STEP, |p| p.step);
        for row in rows {
            let values = row.values.unwrap_or_default();
            let data = if options.span_nulls {
                values
            } else {
                complete_breakpoints(step, values)
            };
            series.push(build_series(ref_id, target, query, row.metric, data));
        }
    }
    series
}

fn reshape_instant(targets: &[Target], plan: &BatchPlan, response: BatchResponse) -> Vec<Series> {
    let mut series = Vec::new();
    for (param, rows) in response_groups(response, &plan.instant) {
        let ref_id = param.map_or("", |p| p.ref_id.as_str());
        let query = param.map_or("", |p| p.query.as_str());
        let target = find_target(targets, ref_id);
        for row in rows {
            let data = match row.values {
                Some(values) => values,
                None => row.value.into_iter().collect(),
            };
            series.push(build_series(ref_id, target, query, row.metric, data));
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatasourceRef, TimeRange, Variable};
    use async_trait::async_trait;

    struct NoTransport;

    #[async_trait]
    impl QueryTransport for NoTransport {
        async fn fetch_range_batch(
            &self,
            _payload: &BatchPayload<BatchRangeParam>,
            _signal_key: &str,
        ) -> Result<BatchResponse> {
            Err(DashQueryError::Internal("unexpected range call".into()))
        }

        async fn fetch_instant_batch(
            &self,
            _payload: &BatchPayload<BatchInstantParam>,
            _signal_key: &str,
        ) -> Result<BatchResponse> {
            Err(DashQueryError::Internal("unexpected instant call".into()))
        }
    }

    fn options(targets: Vec<Target>) -> QueryOptions {
        let mut options = QueryOptions::new(DatasourceRef::Id(1), TimeRange::new(1000, 3400), targets);
        options.id = Some("42".to_string());
        options
    }

    #[test]
    fn test_assign_ref_ids_by_position() {
        let mut explicit = Target::new("b");
        explicit.ref_id = Some("X".into());
        let assigned = assign_ref_ids(&[Target::new("a"), explicit, Target::new("c")]);
        let ids: Vec<_> = assigned.iter().map(|t| t.ref_id().unwrap()).collect();
        assert_eq!(ids, vec!["A", "X", "C"]);
    }

    #[test]
    fn test_plan_classifies_and_skips_empty() {
        let mut instant = Target::new("count(up)");
        instant.instant = true;
        let targets = assign_ref_ids(&[Target::new("up"), instant, Target::new("")]);
        let opts = options(targets.clone());
        let planner = QueryPlanner::with_transport(NoTransport);
        let plan = planner
            .plan(&opts, &targets, ResolvedRange::new(1000, 3400), Utc::now())
            .unwrap();

        assert_eq!(
            plan.range,
            vec![BatchRangeParam {
                start: 1000,
                end: 3400,
                query: "up".into(),
                step: 10,
                ref_id: "A".into(),
            }]
        );
        assert_eq!(
            plan.instant,
            vec![BatchInstantParam {
                time: 3400,
                query: "count(up)".into(),
                ref_id: "B".into(),
            }]
        );
        assert_eq!(plan.signal_key, "42-up-count(up)");
    }

    #[test]
    fn test_plan_keeps_whitespace_expressions() {
        let targets = assign_ref_ids(&[Target::new(" ")]);
        let opts = options(targets.clone());
        let planner = QueryPlanner::with_transport(NoTransport);
        let plan = planner
            .plan(&opts, &targets, ResolvedRange::new(1000, 3400), Utc::now())
            .unwrap();
        assert_eq!(plan.range.len(), 1);
        assert_eq!(plan.range[0].query, " ");
    }

    #[test]
    fn test_plan_substitutes_variables() {
        let targets = assign_ref_ids(&[Target::new("up{ident=\"$ident\"}[$__interval]")]);
        let mut opts = options(targets.clone());
        opts.variable_config = Some(vec![Variable::single("ident", "h1")]);
        let planner = QueryPlanner::with_transport(NoTransport);
        let plan = planner
            .plan(&opts, &targets, ResolvedRange::new(1000, 3400), Utc::now())
            .unwrap();
        assert_eq!(plan.range[0].query, "up{ident=\"h1\"}[10s]");
        // The signal key keeps the unresolved expression.
        assert_eq!(plan.signal_key, "42-up{ident=\"$ident\"}[$__interval]");
    }

    #[test]
    fn test_series_without_target_keeps_dispatched_query() {
        let series = build_series("A", None, "rate(x[10s])", Labels::new(), vec![]);
        assert_eq!(series.expr, "rate(x[10s])");
        assert_eq!(series.name, "{}");

        let target = Target::new("rate(x[$__interval])");
        let series = build_series("A", Some(&target), "rate(x[10s])", Labels::new(), vec![]);
        assert_eq!(series.expr, "rate(x[$__interval])");
    }

    #[test]
    fn test_non_query_panel_types() {
        assert!(is_non_query_panel(Some("text")));
        assert!(is_non_query_panel(Some("iframe")));
        assert!(!is_non_query_panel(Some("timeseries")));
        assert!(!is_non_query_panel(None));
    }

    #[tokio::test]
    async fn test_no_targets_issue_no_calls() {
        let planner = QueryPlanner::with_transport(NoTransport);
        let mut opts = options(vec![]);
        opts.inspect = true;
        let result = planner.query(&opts).await.unwrap();
        assert!(result.series.is_empty());
        assert_eq!(result.query, Some(vec![]));
    }
}
