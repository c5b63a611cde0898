//! Scan trigger endpoint.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use super::auth::Authorized;
use super::ApiResponse;
use crate::config::{parse_ticker_list, ScanConfig};
use crate::error::{AppError, Result};
use crate::types::{ScanRequest, ScanResponse};
use crate::AppState;

/// Body of `POST /api/research`. Omitted fields fall back to configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResearchRequest {
    pub tickers: Option<Vec<String>>,
    pub lookback_days: Option<u32>,
    pub min_volume: Option<f64>,
    pub max_opportunities: Option<usize>,
}

impl ResearchRequest {
    /// Fill in defaults and validate.
    pub fn resolve(self, defaults: &ScanConfig) -> Result<ScanRequest> {
        let tickers = match self.tickers {
            Some(list) => {
                let parsed = parse_ticker_list(&list.join(","));
                if parsed.is_empty() {
                    return Err(AppError::BadRequest("tickers must not be empty".to_string()));
                }
                parsed
            }
            None => defaults.tickers.clone(),
        };

        let lookback_days = self.lookback_days.unwrap_or(defaults.lookback_days);
        if lookback_days == 0 {
            return Err(AppError::BadRequest(
                "lookback_days must be positive".to_string(),
            ));
        }

        let min_volume = self.min_volume.unwrap_or(defaults.min_volume);
        if !min_volume.is_finite() || min_volume < 0.0 {
            return Err(AppError::BadRequest(
                "min_volume must be a non-negative number".to_string(),
            ));
        }

        let max_opportunities = self.max_opportunities.unwrap_or(defaults.max_opportunities);
        if max_opportunities == 0 {
            return Err(AppError::BadRequest(
                "max_opportunities must be at least 1".to_string(),
            ));
        }

        Ok(ScanRequest {
            tickers,
            lookback_days,
            min_volume,
            max_opportunities,
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/research", post(research))
}

/// POST /api/research
///
/// Run a scan and reconcile its results with the ledger.
async fn research(
    State(state): State<AppState>,
    _auth: Authorized,
    body: Option<Json<ResearchRequest>>,
) -> Result<Json<ApiResponse<ScanResponse>>> {
    let Json(request) = body.unwrap_or_default();
    let request = request.resolve(state.scanner.config())?;

    info!("Finding opportunities: max={}", request.max_opportunities);
    let response = state.scanner.scan(request).await?;

    Ok(Json(ApiResponse::new(response)))
}
