#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

use dashquery::models::{
    BatchInstantParam, BatchPayload, BatchRangeParam, BatchResponse, ColumnInfo, MetaParams,
    RawSeriesResult,
};
use dashquery::{DashQueryError, MetaTransport, QueryTransport, Result};

/// Canned fetch service that records every call it receives.
#[derive(Default)]
pub struct MockTransport {
    pub range_response: BatchResponse,
    pub instant_response: BatchResponse,
    pub fail_with: Option<String>,
    pub range_calls: Mutex<Vec<(BatchPayload<BatchRangeParam>, String)>>,
    pub instant_calls: Mutex<Vec<(BatchPayload<BatchInstantParam>, String)>>,

    pub databases: Vec<String>,
    pub tables: HashMap<String, Vec<String>>,
    pub stables: HashMap<String, Vec<String>>,
    pub columns: HashMap<String, Vec<ColumnInfo>>,
    pub meta_calls: Mutex<Vec<(String, MetaParams)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn range_call_count(&self) -> usize {
        self.range_calls.lock().len()
    }

    pub fn instant_call_count(&self) -> usize {
        self.instant_calls.lock().len()
    }

    pub fn meta_call_count(&self, kind: &str) -> usize {
        self.meta_calls.lock().iter().filter(|(k, _)| k == kind).count()
    }

    fn check(&self) -> Result<()> {
        match &self.fail_with {
            Some(message) => Err(DashQueryError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn fetch_range_batch(
        &self,
        payload: &BatchPayload<BatchRangeParam>,
        signal_key: &str,
    ) -> Result<BatchResponse> {
        self.range_calls
            .lock()
            .push((payload.clone(), signal_key.to_string()));
        self.check()?;
        Ok(self.range_response.clone())
    }

    async fn fetch_instant_batch(
        &self,
        payload: &BatchPayload<BatchInstantParam>,
        signal_key: &str,
    ) -> Result<BatchResponse> {
        self.instant_calls
            .lock()
            .push((payload.clone(), signal_key.to_string()));
        self.check()?;
        Ok(self.instant_response.clone())
    }
}

#[async_trait]
impl MetaTransport for MockTransport {
    async fn list_databases(&self, params: &MetaParams) -> Result<Vec<String>> {
        self.meta_calls.lock().push(("databases".into(), params.clone()));
        self.check()?;
        Ok(self.databases.clone())
    }

    async fn list_tables(&self, params: &MetaParams) -> Result<Vec<String>> {
        self.meta_calls.lock().push(("tables".into(), params.clone()));
        self.check()?;
        let source = if params.is_stable == Some(true) {
            &self.stables
        } else {
            &self.tables
        };
        Ok(params
            .db
            .as_ref()
            .and_then(|db| source.get(db).cloned())
            .unwrap_or_default())
    }

    async fn list_columns(&self, params: &MetaParams) -> Result<Vec<ColumnInfo>> {
        self.meta_calls.lock().push(("columns".into(), params.clone()));
        self.check()?;
        let key = format!(
            "{}.{}",
            params.db.clone().unwrap_or_default(),
            params.table.clone().unwrap_or_default()
        );
        Ok(self.columns.get(&key).cloned().unwrap_or_default())
    }
}

pub fn matrix_row(labels: serde_json::Value, values: serde_json::Value) -> RawSeriesResult {
    serde_json::from_value(json!({ "metric": labels, "values": values })).unwrap()
}

pub fn vector_row(labels: serde_json::Value, value: serde_json::Value) -> RawSeriesResult {
    serde_json::from_value(json!({ "metric": labels, "value": value })).unwrap()
}

pub fn column(name: &str, data_type: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
    }
}
