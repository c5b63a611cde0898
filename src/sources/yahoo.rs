//! Yahoo Finance API client for daily stock history.
//!
//! Uses the unofficial v8 chart endpoint with an explicit
//! `period1`/`period2` window and daily interval.

use super::MarketDataSource;
use crate::error::DataError;
use crate::types::PriceBar;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart response.
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

/// Normalize symbol for Yahoo Finance API.
/// Yahoo uses hyphens instead of dots for share classes (e.g., BRK-B not BRK.B)
fn normalize_yahoo_symbol(symbol: &str) -> String {
    symbol.to_uppercase().replace('.', "-")
}

/// Yahoo Finance API client.
pub struct YahooFinanceClient {
    client: Client,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client.
    pub fn new() -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self { client })
    }

    /// Fetch daily bars between two Unix timestamps (seconds).
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        period1: i64,
        period2: i64,
    ) -> Result<Vec<PriceBar>, DataError> {
        let yahoo_symbol = normalize_yahoo_symbol(symbol);
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d&includePrePost=false",
            CHART_URL, yahoo_symbol, period1, period2
        );

        debug!("Fetching Yahoo Finance data: {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(DataError::Unavailable(format!(
                "{}: API error {}",
                symbol,
                response.status()
            )));
        }

        let data: YahooChartResponse = response.json().await?;
        parse_chart(symbol, data)
    }
}

#[async_trait]
impl MarketDataSource for YahooFinanceClient {
    async fn fetch(&self, ticker: &str, lookback_days: u32) -> Result<Vec<PriceBar>, DataError> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(i64::from(lookback_days));
        self.get_daily_bars(ticker, start.timestamp(), end.timestamp())
            .await
    }
}

/// Convert a chart response into bars, dropping points without a positive close.
fn parse_chart(symbol: &str, data: YahooChartResponse) -> Result<Vec<PriceBar>, DataError> {
    if let Some(error) = data.chart.error {
        return Err(DataError::Unavailable(format!(
            "{}: {} - {}",
            symbol, error.code, error.description
        )));
    }

    let result = data
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| DataError::Unavailable(format!("{}: no results in response", symbol)))?;

    // Delisted or brand-new symbols come back without timestamps
    let Some(timestamps) = result.timestamp else {
        return Ok(Vec::new());
    };

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::Parse(format!("{}: no quote data in response", symbol)))?;

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &timestamp) in timestamps.iter().enumerate() {
        let close = closes.get(i).and_then(|v| *v).unwrap_or(0.0);

        // Skip invalid data points
        if close <= 0.0 {
            continue;
        }

        bars.push(PriceBar {
            time: timestamp * 1000, // Convert to milliseconds
            open: opens.get(i).and_then(|v| *v).unwrap_or(close),
            high: highs.get(i).and_then(|v| *v).unwrap_or(close),
            low: lows.get(i).and_then(|v| *v).unwrap_or(close),
            close,
            volume: volumes.get(i).and_then(|v| *v).unwrap_or(0) as f64,
        });
    }

    Ok(bars)
}
