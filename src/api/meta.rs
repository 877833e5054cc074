use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::ApiState;
use crate::{
    models::{ColumnInfo, MetaParams},
    transport::{MetaTransport, QueryTransport},
    DashQueryError, Result,
};

#[derive(Debug, Deserialize)]
pub struct MetaQuery {
    pub datasource_id: i64,
    pub db: Option<String>,
    pub table: Option<String>,
    #[serde(default)]
    pub is_stable: bool,
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DashQueryError::InvalidRequest(format!("missing `{}` parameter", name)))
}

pub async fn list_databases<Q, M>(
    State(state): State<ApiState<Q, M>>,
    Query(query): Query<MetaQuery>,
) -> Result<Json<Vec<String>>>
where
    Q: QueryTransport,
    M: MetaTransport,
{
    info!("Listing databases of datasource {}", query.datasource_id);
    let params = MetaParams::new(query.datasource_id);
    Ok(Json(state.meta.list_databases(&params).await?))
}

pub async fn list_tables<Q, M>(
    State(state): State<ApiState<Q, M>>,
    Query(query): Query<MetaQuery>,
) -> Result<Json<Vec<String>>>
where
    Q: QueryTransport,
    M: MetaTransport,
{
    let params = MetaParams {
        db: Some(required(query.db, "db")?),
        is_stable: Some(query.is_stable),
        ..MetaParams::new(query.datasource_id)
    };
    info!("Listing tables of {:?}", params.db);
    Ok(Json(state.meta.list_tables(&params).await?))
}

pub async fn list_columns<Q, M>(
    State(state): State<ApiState<Q, M>>,
    Query(query): Query<MetaQuery>,
) -> Result<Json<Vec<ColumnInfo>>>
where
    Q: QueryTransport,
    M: MetaTransport,
{
    let params = MetaParams {
        db: Some(required(query.db, "db")?),
        table: Some(required(query.table, "table")?),
        ..MetaParams::new(query.datasource_id)
    };
    info!("Listing columns of {:?}.{:?}", params.db, params.table);
    Ok(Json(state.meta.list_columns(&params).await?))
}
