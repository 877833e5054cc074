use async_trait::async_trait;
use futures::future::{AbortHandle, Abortable, Aborted};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{
    BatchInstantParam, BatchPayload, BatchRangeParam, BatchResponse, ColumnInfo, MetaParams,
    RawSeriesResult,
};
use crate::{DashQueryError, Result};

pub const RANGE_BATCH_PATH: &str = "query-range-batch";
pub const INSTANT_BATCH_PATH: &str = "query-instant-batch";
pub const DATABASES_PATH: &str = "tdengine-databases";
pub const TABLES_PATH: &str = "tdengine-tables";
pub const COLUMNS_PATH: &str = "tdengine-columns";

/// Batched time-series fetch service.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn fetch_range_batch(
        &self,
        payload: &BatchPayload<BatchRangeParam>,
        signal_key: &str,
    ) -> Result<BatchResponse>;

    async fn fetch_instant_batch(
        &self,
        payload: &BatchPayload<BatchInstantParam>,
        signal_key: &str,
    ) -> Result<BatchResponse>;

    /// Path segment of the fetch API, used when recording inspection traces.
    fn pathname(&self) -> &str {
        crate::config::DEFAULT_PATHNAME
    }
}

/// Database/table/column listing service.
#[async_trait]
pub trait MetaTransport: Send + Sync {
    async fn list_databases(&self, params: &MetaParams) -> Result<Vec<String>>;
    async fn list_tables(&self, params: &MetaParams) -> Result<Vec<String>>;
    async fn list_columns(&self, params: &MetaParams) -> Result<Vec<ColumnInfo>>;
}

/// Response envelope of the fetch service: `{"dat": ..., "err": ""}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    dat: Option<T>,
    #[serde(default)]
    err: String,
}

struct InFlight {
    generation: u64,
    handle: AbortHandle,
}

/// Releases a registry slot when its request finishes or is dropped.
struct InFlightGuard<'a> {
    registry: &'a SignalRegistry,
    signal_key: &'a str,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.registry.inflight.lock();
        if inflight
            .get(self.signal_key)
            .map_or(false, |entry| entry.generation == self.generation)
        {
            inflight.remove(self.signal_key);
        }
    }
}

/// Tracks in-flight requests by signal key. Starting a request under a key
/// that is still running aborts the older request.
#[derive(Default)]
pub struct SignalRegistry {
    inflight: Mutex<HashMap<String, InFlight>>,
    next_generation: AtomicU64,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    pub async fn run<F, T>(&self, signal_key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if signal_key.is_empty() {
            return fut.await;
        }

        let (handle, registration) = AbortHandle::new_pair();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .inflight
            .lock()
            .insert(signal_key.to_string(), InFlight { generation, handle });
        if let Some(previous) = previous {
            debug!("Superseding in-flight request for key {}", signal_key);
            previous.handle.abort();
        }

        let _guard = InFlightGuard {
            registry: self,
            signal_key,
            generation,
        };

        match Abortable::new(fut, registration).await {
            Ok(result) => result,
            Err(Aborted) => Err(DashQueryError::Cancelled(signal_key.to_string())),
        }
    }
}

/// reqwest client for the batch query and metadata endpoints.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: Config,
    signals: Arc<SignalRegistry>,
}

impl HttpTransport {
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config,
            signals: Arc::new(SignalRegistry::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Default,
    {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Fetch service returned {} for {}", status, url);
            return Err(DashQueryError::Upstream(format!("HTTP {}: {}", status, text)));
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.err.is_empty() {
            return Err(DashQueryError::Upstream(envelope.err));
        }
        Ok(envelope.dat.unwrap_or_default())
    }

    async fn post_batch<P>(&self, path: &str, payload: &BatchPayload<P>, signal_key: &str) -> Result<BatchResponse>
    where
        P: Serialize + Sync,
    {
        let dat: Vec<Vec<RawSeriesResult>> = self
            .signals
            .run(signal_key, self.post(path, payload))
            .await?;
        Ok(BatchResponse { dat })
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn fetch_range_batch(
        &self,
        payload: &BatchPayload<BatchRangeParam>,
        signal_key: &str,
    ) -> Result<BatchResponse> {
        self.post_batch(RANGE_BATCH_PATH, payload, signal_key).await
    }

    async fn fetch_instant_batch(
        &self,
        payload: &BatchPayload<BatchInstantParam>,
        signal_key: &str,
    ) -> Result<BatchResponse> {
        self.post_batch(INSTANT_BATCH_PATH, payload, signal_key).await
    }

    fn pathname(&self) -> &str {
        &self.config.pathname
    }
}

#[async_trait]
impl MetaTransport for HttpTransport {
    async fn list_databases(&self, params: &MetaParams) -> Result<Vec<String>> {
        self.post(DATABASES_PATH, params).await
    }

    async fn list_tables(&self, params: &MetaParams) -> Result<Vec<String>> {
        self.post(TABLES_PATH, params).await
    }

    async fn list_columns(&self, params: &MetaParams) -> Result<Vec<ColumnInfo>> {
        self.post(COLUMNS_PATH, params).await
    }
}
