use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashQueryError {
    #[error("Invalid datasource: {0}")]
    InvalidDatasource(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid time range: {0}")]
    TimeRange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for DashQueryError {
    fn from(err: reqwest::Error) -> Self {
        DashQueryError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DashQueryError {
    fn from(err: serde_json::Error) -> Self {
        DashQueryError::Serialization(err.to_string())
    }
}

impl IntoResponse for DashQueryError {
    fn into_response(self) -> Response {
        let status = match self {
            DashQueryError::InvalidDatasource(_)
            | DashQueryError::InvalidRequest(_)
            | DashQueryError::Serialization(_)
            | DashQueryError::TimeRange(_) => StatusCode::BAD_REQUEST,
            DashQueryError::NotFound(_) => StatusCode::NOT_FOUND,
            DashQueryError::Transport(_) | DashQueryError::Upstream(_) => StatusCode::BAD_GATEWAY,
            // Superseded by a newer request for the same panel.
            DashQueryError::Cancelled(_) => StatusCode::CONFLICT,
            DashQueryError::Config(_) | DashQueryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, DashQueryError>;
