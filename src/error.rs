use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Market data source errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("No data available: {0}")]
    Unavailable(String),

    #[error("Insufficient history: {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Opportunity store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Opportunity {0} not found")]
    NotFound(i64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Opportunity {id} cannot be reactivated: opportunity {active} is already active")]
    ActiveConflict { id: i64, active: i64 },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid authentication token")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Store(StoreError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Opportunity {} not found", id))
            }
            AppError::Store(e @ StoreError::ActiveConflict { .. }) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
