use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Label set of one series, ordered so derived names are stable.
pub type Labels = BTreeMap<String, String>;

/// One side of a raw time window: absolute seconds or an expression like `now-1h`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBound {
    Seconds(i64),
    Text(String),
}

impl TimeBound {
    pub fn is_empty(&self) -> bool {
        matches!(self, TimeBound::Text(s) if s.trim().is_empty())
    }
}

impl From<i64> for TimeBound {
    fn from(secs: i64) -> Self {
        TimeBound::Seconds(secs)
    }
}

impl From<i32> for TimeBound {
    fn from(secs: i32) -> Self {
        TimeBound::Seconds(i64::from(secs))
    }
}

impl From<&str> for TimeBound {
    fn from(text: &str) -> Self {
        TimeBound::Text(text.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeBound>,
}

impl TimeRange {
    pub fn new(start: impl Into<TimeBound>, end: impl Into<TimeBound>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    /// A window without a start bound is not ready to be queried yet.
    pub fn has_start(&self) -> bool {
        self.start.as_ref().map_or(false, |s| !s.is_empty())
    }
}

/// One query definition within a panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub instant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_data_points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    /// Relative window overriding the panel window for step computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeRange>,
}

impl Target {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            ..Default::default()
        }
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.ref_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Datasource reference as stored on a panel: an id, or a variable placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasourceRef {
    Id(i64),
    Name(String),
}

impl DatasourceRef {
    pub fn as_id(&self) -> Option<i64> {
        match self {
            DatasourceRef::Id(id) => Some(*id),
            DatasourceRef::Name(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Single(String),
    Multi(Vec<String>),
}

/// A dashboard variable with its currently selected value(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<VariableValue>,
}

impl Variable {
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(VariableValue::Single(value.into())),
        }
    }

    pub fn multi<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            value: Some(VariableValue::Multi(
                values.into_iter().map(Into::into).collect(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRangeParam {
    pub start: i64,
    pub end: i64,
    pub query: String,
    pub step: i64,
    #[serde(rename = "refId")]
    pub ref_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInstantParam {
    pub time: i64,
    pub query: String,
    #[serde(rename = "refId")]
    pub ref_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload<P> {
    pub queries: Vec<P>,
    pub datasource_id: i64,
}

/// `[timestamp, value]`; a null value marks a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample(pub f64, pub Value);

impl Sample {
    pub fn new(timestamp: f64, value: impl Into<Value>) -> Self {
        Sample(timestamp, value.into())
    }

    pub fn gap(timestamp: f64) -> Self {
        Sample(timestamp, Value::Null)
    }

    pub fn timestamp(&self) -> f64 {
        self.0
    }

    pub fn is_gap(&self) -> bool {
        self.1.is_null()
    }
}

/// One row of a batch response: a matrix series (`values`) or a vector sample (`value`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSeriesResult {
    #[serde(default)]
    pub metric: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Sample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Sample>,
}

/// `dat[i]` holds the rows for the i-th query of the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub dat: Vec<Vec<RawSeriesResult>>,
}

/// Request parameters shared by the metadata listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaParams {
    pub cate: String,
    pub datasource_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_stable: Option<bool>,
}

impl MetaParams {
    pub const TDENGINE: &'static str = "tdengine";

    pub fn new(datasource_id: i64) -> Self {
        Self {
            cate: Self::TDENGINE.to_string(),
            datasource_id,
            db: None,
            table: None,
            is_stable: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: String,
    pub ref_id: String,
    pub name: String,
    pub metric: Labels,
    pub expr: String,
    pub data: Vec<Sample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectKind {
    #[serde(rename = "Query Range")]
    QueryRange,
    #[serde(rename = "Query")]
    Query,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectRequest {
    pub url: String,
    pub method: String,
    pub data: Value,
}

/// Diagnostic record of one issued batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectEntry {
    #[serde(rename = "type")]
    pub kind: InspectKind,
    pub request: InspectRequest,
    pub response: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub series: Vec<Series>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Vec<InspectEntry>>,
}

/// Everything the planner needs to query one panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// Panel id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub dashboard_id: String,
    pub datasource_value: DatasourceRef,
    pub time: TimeRange,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_config: Option<Vec<Variable>>,
    #[serde(default)]
    pub span_nulls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoped_vars: Option<HashMap<String, String>>,
    #[serde(default)]
    pub inspect: bool,
    /// Panel type, e.g. `timeseries`, `text`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub panel_type: Option<String>,
}

impl QueryOptions {
    pub fn new(datasource_value: DatasourceRef, time: TimeRange, targets: Vec<Target>) -> Self {
        Self {
            id: None,
            dashboard_id: String::new(),
            datasource_value,
            time,
            targets,
            variable_config: None,
            span_nulls: false,
            scoped_vars: None,
            inspect: false,
            panel_type: None,
        }
    }
}
