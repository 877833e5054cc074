use axum::{extract::State, Json};
use tracing::info;

use super::ApiState;
use crate::{
    models::{QueryOptions, QueryResult},
    transport::{MetaTransport, QueryTransport},
    Result,
};

pub async fn run_query<Q, M>(
    State(state): State<ApiState<Q, M>>,
    Json(options): Json<QueryOptions>,
) -> Result<Json<QueryResult>>
where
    Q: QueryTransport,
    M: MetaTransport,
{
    info!(
        "Querying panel {} with {} targets",
        options.id.as_deref().unwrap_or("-"),
        options.targets.len()
    );

    let result = state.planner.query(&options).await?;
    Ok(Json(result))
}
