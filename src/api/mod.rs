pub mod auth;
pub mod health;
pub mod opportunities;
pub mod research;

use crate::AppState;
use axum::Router;
use serde::Serialize;

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(research::router())
        .merge(opportunities::stats_router())
        .nest("/api/opportunities", opportunities::router())
}
