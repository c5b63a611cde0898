//! Scan orchestrator.
//!
//! Fetches and classifies tickers as spawned tasks through a bounded,
//! order-preserving window, then reconciles candidates with the ledger one at
//! a time in ticker order on the blocking pool. Every scan attempt writes
//! exactly one agent action row.

use crate::config::ScanConfig;
use crate::error::{DataError, StoreError};
use crate::services::ledger::Ledger;
use crate::services::signals::{classify, compute_indicators, MIN_HISTORY};
use crate::sources::MarketDataSource;
use crate::types::{
    trailing_mean_volume, ActionStatus, AgentAction, KeyIndicators, OpportunityPayload,
    OpportunityRecord, ScanRequest, ScanResponse, SkipReason, TechnicalOpportunity,
    TickerOutcome,
};
use chrono::Utc;
use futures_util::{pin_mut, stream, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Bars averaged for the recent-volume filter.
const RECENT_VOLUME_BARS: usize = 5;

/// Running counters for one scan.
#[derive(Debug, Default)]
struct ScanTally {
    analyzed: u32,
    failed: u32,
    new_count: u32,
    updated_count: u32,
    results: Vec<OpportunityRecord>,
}

pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    ledger: Arc<Ledger>,
    config: ScanConfig,
    agent_name: String,
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        ledger: Arc<Ledger>,
        config: ScanConfig,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            ledger,
            config,
            agent_name: agent_name.into(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Run one scan and log it.
    ///
    /// Per-ticker problems never abort the scan. A ledger or store failure
    /// does: an `error` action row is written and the error is returned.
    /// Records reconciled before the failure stay persisted.
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanResponse, StoreError> {
        let started = Instant::now();
        let mut tally = ScanTally::default();

        info!(
            "Scanning {} tickers (min volume {:.0}, max {} opportunities)",
            request.tickers.len(),
            request.min_volume,
            request.max_opportunities
        );

        let outcome = self.run(&request, &mut tally).await;
        let execution_time_seconds = started.elapsed().as_secs_f64();

        if let Err(e) = outcome {
            error!("Scan failed after {:.2}s: {}", execution_time_seconds, e);
            let action = self.action(
                &tally,
                execution_time_seconds,
                ActionStatus::Error,
                format!("Error: {}", e),
            );
            if let Err(log_err) = self.log_action(action).await {
                error!("Failed to record scan error: {}", log_err);
            }
            return Err(e);
        }

        tally.results.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(Ordering::Equal)
        });

        let message = format!(
            "Found {} opportunities ({} new, {} updated)",
            tally.results.len(),
            tally.new_count,
            tally.updated_count
        );
        let status = if tally.failed > 0 {
            ActionStatus::Partial
        } else {
            ActionStatus::Success
        };

        let action = self.action(&tally, execution_time_seconds, status, message.clone());
        self.log_action(action).await?;

        info!(
            "Technical analysis: {} from {} analyzed ({} failed) in {:.2}s",
            message, tally.analyzed, tally.failed, execution_time_seconds
        );

        Ok(ScanResponse {
            opportunities: tally.results.iter().map(TechnicalOpportunity::from).collect(),
            execution_time_seconds,
            analysis_type: "Technical Analysis".to_string(),
            message,
            analyzed: tally.analyzed,
            new_count: tally.new_count,
            updated_count: tally.updated_count,
        })
    }

    async fn run(&self, request: &ScanRequest, tally: &mut ScanTally) -> Result<(), StoreError> {
        let timeout_ms = self.config.fetch_timeout_ms;
        let timeout = Duration::from_millis(timeout_ms);
        let lookback_days = request.lookback_days;
        let min_volume = request.min_volume;

        // Spawned so each deadline only covers its own fetch and keeps
        // running while the loop below is reconciling.
        let outcomes = stream::iter(request.tickers.iter().cloned())
            .map(|ticker| {
                let source = self.source.clone();
                let symbol = ticker.clone();
                let task = tokio::spawn(async move {
                    let evaluation =
                        evaluate_ticker(&*source, &symbol, lookback_days, min_volume);
                    match tokio::time::timeout(timeout, evaluation).await {
                        Ok(outcome) => outcome,
                        Err(_) => TickerOutcome::Failed(DataError::Timeout(timeout_ms).to_string()),
                    }
                });
                async move {
                    let outcome = task
                        .await
                        .unwrap_or_else(|e| TickerOutcome::Failed(format!("Task failed: {}", e)));
                    (ticker, outcome)
                }
            })
            .buffered(self.config.concurrency.max(1));
        pin_mut!(outcomes);

        while tally.results.len() < request.max_opportunities {
            let Some((ticker, outcome)) = outcomes.next().await else {
                break;
            };

            if outcome.was_analyzed() {
                tally.analyzed += 1;
            }

            match outcome {
                TickerOutcome::Skip(reason) => debug!("Skipping {}: {}", ticker, reason),
                TickerOutcome::Failed(reason) => {
                    warn!("Error analyzing {}: {}", ticker, reason);
                    tally.failed += 1;
                }
                TickerOutcome::Candidate(payload) => {
                    let ledger = self.ledger.clone();
                    let reconciled =
                        blocking(move || ledger.reconcile(*payload, Utc::now())).await?;
                    if reconciled.is_created() {
                        tally.new_count += 1;
                    } else {
                        tally.updated_count += 1;
                    }
                    tally.results.push(reconciled.record);
                }
            }
        }

        Ok(())
    }

    /// Fetch, filter, compute and classify a single ticker.
    pub async fn evaluate(&self, ticker: &str, request: &ScanRequest) -> TickerOutcome {
        evaluate_ticker(
            self.source.as_ref(),
            ticker,
            request.lookback_days,
            request.min_volume,
        )
        .await
    }

    async fn log_action(&self, action: AgentAction) -> Result<i64, StoreError> {
        let ledger = self.ledger.clone();
        blocking(move || ledger.store().append_action(&action)).await
    }

    fn action(
        &self,
        tally: &ScanTally,
        execution_time_seconds: f64,
        status: ActionStatus,
        notes: String,
    ) -> AgentAction {
        AgentAction {
            id: 0,
            agent_name: self.agent_name.clone(),
            action_type: "scan".to_string(),
            timestamp: Utc::now(),
            opportunities_processed: tally.analyzed,
            new_opportunities: tally.new_count,
            execution_time_seconds,
            status,
            notes: Some(notes),
        }
    }
}

/// Fetch, filter, compute and classify a single ticker.
pub async fn evaluate_ticker(
    source: &dyn MarketDataSource,
    ticker: &str,
    lookback_days: u32,
    min_volume: f64,
) -> TickerOutcome {
    let bars = match source.fetch(ticker, lookback_days).await {
        Ok(bars) => bars,
        Err(DataError::Unavailable(reason)) => {
            warn!("No data for {}: {}", ticker, reason);
            return TickerOutcome::Skip(SkipReason::NoData);
        }
        Err(e) => return TickerOutcome::Failed(e.to_string()),
    };

    if bars.is_empty() {
        warn!("No data for {}", ticker);
        return TickerOutcome::Skip(SkipReason::NoData);
    }
    if bars.len() < MIN_HISTORY {
        warn!("Insufficient data for {}: {} bars", ticker, bars.len());
        return TickerOutcome::Skip(SkipReason::InsufficientHistory {
            have: bars.len(),
            need: MIN_HISTORY,
        });
    }

    let recent_volume = trailing_mean_volume(&bars, RECENT_VOLUME_BARS).unwrap_or(0.0);
    if recent_volume < min_volume {
        return TickerOutcome::Skip(SkipReason::LowVolume {
            mean: recent_volume,
            min: min_volume,
        });
    }

    let bundle = match compute_indicators(&bars) {
        Ok(bundle) => bundle,
        Err(DataError::InsufficientHistory { have, need }) => {
            return TickerOutcome::Skip(SkipReason::InsufficientHistory { have, need })
        }
        Err(e) => return TickerOutcome::Failed(e.to_string()),
    };

    let Some(candidate) = classify(bundle.close, &bundle) else {
        return TickerOutcome::Skip(SkipReason::NoSetup);
    };

    debug!(
        "{}: {} ({:.2} confidence)",
        ticker, candidate.setup_type, candidate.confidence_score
    );

    let key_indicators = KeyIndicators::snapshot(&bundle, &candidate);
    TickerOutcome::Candidate(Box::new(OpportunityPayload {
        ticker: ticker.to_string(),
        setup_type: candidate.setup_type,
        confidence_score: candidate.confidence_score,
        price: bundle.close,
        volume: bundle.volume as i64,
        key_indicators,
        rationale: candidate.rationale,
        timeframe: candidate.timeframe,
    }))
}

/// Run a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Unavailable(format!("Store task failed: {}", e)))?
}
