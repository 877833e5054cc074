use axum::{
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::Config,
    metrics,
    planner::QueryPlanner,
    transport::{HttpTransport, MetaTransport, QueryTransport},
    DashQueryError, Result,
};

pub mod meta;
pub mod query;

pub struct ApiState<Q, M> {
    pub planner: Arc<QueryPlanner<Q>>,
    pub meta: Arc<M>,
}

impl<Q, M> Clone for ApiState<Q, M> {
    fn clone(&self) -> Self {
        Self {
            planner: Arc::clone(&self.planner),
            meta: Arc::clone(&self.meta),
        }
    }
}

impl<Q: QueryTransport, M: MetaTransport> ApiState<Q, M> {
    pub fn new(query_transport: Q, meta_transport: M) -> Self {
        Self {
            planner: Arc::new(QueryPlanner::with_transport(query_transport)),
            meta: Arc::new(meta_transport),
        }
    }
}

pub fn router<Q, M>(state: ApiState<Q, M>) -> Router
where
    Q: QueryTransport + 'static,
    M: MetaTransport + 'static,
{
    Router::new()
        .route("/api/query", post(query::run_query::<Q, M>))
        .route("/api/meta/databases", get(meta::list_databases::<Q, M>))
        .route("/api/meta/tables", get(meta::list_tables::<Q, M>))
        .route("/api/meta/columns", get(meta::list_columns::<Q, M>))
        .route("/metrics", get(export_metrics))
        .route("/health", get(|| async { "ok" }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn export_metrics() -> Result<impl IntoResponse> {
    let body = metrics::gather_text()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

pub async fn start_server(config: Config) -> Result<()> {
    let transport = HttpTransport::new(config.clone())?;
    let state = ApiState::new(transport.clone(), transport);
    let app = router(state);

    info!(
        "Starting query service on {} (upstream {})",
        config.listen_addr, config.upstream_url
    );

    let listener = TcpListener::bind(&config.listen_addr).await.map_err(|e| {
        DashQueryError::Internal(format!("Failed to bind to address: {}", e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DashQueryError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
