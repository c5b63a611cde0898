//! Opportunity ledger endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::auth::Authorized;
use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::types::{
    round_to, AgentAction, HistoryEntry, OpportunityRecord, OpportunityStatus, StoreStats,
};
use crate::AppState;

/// Agent actions shown alongside a record's details.
const DETAIL_ACTIONS: usize = 3;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of records (default 50).
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessedRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProcessedResponse {
    pub marked: usize,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Indicator value with a plain-language reading.
#[derive(Debug, Serialize, PartialEq)]
pub struct Reading {
    pub value: Option<f64>,
    pub interpretation: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MovingAverageReading {
    pub sma_20: Option<f64>,
    pub current_price: f64,
    /// Percent distance of the price from SMA(20), two decimals.
    pub distance_from_sma: Option<f64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TechnicalReadout {
    pub rsi: Reading,
    pub macd: Reading,
    pub volume: Reading,
    pub moving_averages: MovingAverageReading,
}

impl TechnicalReadout {
    pub fn for_record(record: &OpportunityRecord) -> Self {
        let ki = &record.key_indicators;
        Self {
            rsi: Reading {
                value: ki.rsi,
                interpretation: ki.rsi.map(rsi_interpretation),
            },
            macd: Reading {
                value: ki.macd_histogram,
                interpretation: ki.macd_histogram.map(macd_interpretation),
            },
            volume: Reading {
                value: ki.volume_ratio,
                interpretation: ki.volume_ratio.map(volume_interpretation),
            },
            moving_averages: MovingAverageReading {
                sma_20: ki.sma_20,
                current_price: record.price,
                distance_from_sma: ki
                    .sma_20
                    .filter(|sma| *sma != 0.0)
                    .map(|sma| round_to((record.price - sma) / sma * 100.0, 2)),
            },
        }
    }
}

/// Response of `GET /api/opportunities/:id/details`.
#[derive(Debug, Serialize)]
pub struct OpportunityDetails {
    pub opportunity: OpportunityRecord,
    pub technical_indicators: TechnicalReadout,
    /// Newest first.
    pub history: Vec<HistoryEntry>,
    pub recent_actions: Vec<AgentAction>,
}

pub fn rsi_interpretation(rsi: f64) -> String {
    if rsi > 70.0 {
        format!("Overbought ({:.1}) - Price may reverse downward", rsi)
    } else if rsi < 30.0 {
        format!("Oversold ({:.1}) - Price may reverse upward", rsi)
    } else {
        format!("Neutral ({:.1}) - No extreme momentum condition", rsi)
    }
}

pub fn macd_interpretation(histogram: f64) -> String {
    if histogram > 0.0 {
        format!("Bullish ({:.3}) - Momentum is increasing", histogram)
    } else {
        format!("Bearish ({:.3}) - Momentum is decreasing", histogram)
    }
}

pub fn volume_interpretation(ratio: f64) -> String {
    if ratio > 1.5 {
        format!("High volume ({:.1}x) - Strong interest/conviction", ratio)
    } else if ratio < 0.8 {
        format!("Low volume ({:.1}x) - Weak participation", ratio)
    } else {
        format!("Normal volume ({:.1}x) - Average participation", ratio)
    }
}

/// Routes nested under `/api/opportunities`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_active))
        .route("/new", get(list_new))
        .route("/processed", post(mark_processed))
        .route("/:id/details", get(details))
        .route("/:id/status", post(change_status))
}

pub fn stats_router() -> Router<AppState> {
    Router::new().route("/api/stats", get(stats))
}

/// GET /api/opportunities
async fn list_active(
    State(state): State<AppState>,
    _auth: Authorized,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<OpportunityRecord>>>> {
    let records = state
        .store
        .active_opportunities(query.limit.unwrap_or(50))?;
    Ok(Json(ApiResponse::new(records)))
}

/// GET /api/opportunities/new
///
/// Active records with changes not yet handed off downstream.
async fn list_new(
    State(state): State<AppState>,
    _auth: Authorized,
) -> Result<Json<ApiResponse<Vec<OpportunityRecord>>>> {
    let records = state.store.new_opportunities()?;
    Ok(Json(ApiResponse::new(records)))
}

/// POST /api/opportunities/processed
async fn mark_processed(
    State(state): State<AppState>,
    _auth: Authorized,
    Json(request): Json<ProcessedRequest>,
) -> Result<Json<ApiResponse<ProcessedResponse>>> {
    let marked = state.store.mark_processed(&request.ids)?;
    Ok(Json(ApiResponse::new(ProcessedResponse { marked })))
}

/// GET /api/opportunities/:id/details
async fn details(
    State(state): State<AppState>,
    _auth: Authorized,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OpportunityDetails>>> {
    let opportunity = state
        .store
        .get(id)?
        .ok_or_else(|| AppError::NotFound(format!("Opportunity {} not found", id)))?;

    let history = state.store.history(id)?;
    let recent_actions = state
        .store
        .recent_actions(&state.config.agent_name, DETAIL_ACTIONS)?;

    Ok(Json(ApiResponse::new(OpportunityDetails {
        technical_indicators: TechnicalReadout::for_record(&opportunity),
        opportunity,
        history,
        recent_actions,
    })))
}

/// POST /api/opportunities/:id/status
async fn change_status(
    State(state): State<AppState>,
    _auth: Authorized,
    Path(id): Path<i64>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ApiResponse<OpportunityRecord>>> {
    let status = OpportunityStatus::from_str(&request.status)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown status '{}'", request.status)))?;
    let record = state.ledger.change_status(id, status)?;
    Ok(Json(ApiResponse::new(record)))
}

/// GET /api/stats
async fn stats(
    State(state): State<AppState>,
    _auth: Authorized,
) -> Result<Json<ApiResponse<StoreStats>>> {
    Ok(Json(ApiResponse::new(state.store.stats()?)))
}
