//! Liveness endpoint. Unauthenticated.

use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

const SERVICE_NAME: &str = "technical-researcher";

#[derive(Debug, Serialize)]
struct HealthResponse {
    /// `ok`, or `degraded` when the store cannot be read.
    status: &'static str,
    service: &'static str,
    version: &'static str,
    last_scan: Option<DateTime<Utc>>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, last_scan) = match state.store.stats() {
        Ok(stats) => ("ok", stats.last_run),
        Err(e) => {
            warn!("Health check could not read store: {}", e);
            ("degraded", None)
        }
    };

    Json(HealthResponse {
        status,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        last_scan,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
