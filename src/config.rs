use std::env;

use crate::types::ScanRequest;

/// Default scan universe: large-cap tech, finance, healthcare, consumer,
/// energy, growth names, then sector ETFs.
pub const DEFAULT_TICKERS: [&str; 49] = [
    // Large-cap tech
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA", "TSLA", "CRM", "ADBE", "NFLX",
    // Finance
    "JPM", "BAC", "GS", "MS", "WFC", "C",
    // Healthcare
    "JNJ", "PFE", "UNH", "ABBV", "MRK", "BMY",
    // Consumer
    "WMT", "HD", "MCD", "NKE", "SBUX", "DIS",
    // Energy
    "XOM", "CVX", "COP", "EOG", "SLB", "OXY",
    // Growth
    "COIN", "ROKU", "SHOP", "SQ", "PYPL", "ZM", "SNOW", "PLTR",
    // ETFs
    "SPY", "QQQ", "IWM", "XLF", "XLE", "XLK", "XLV",
];

/// Scan defaults and worker pool limits.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Calendar days of history requested per ticker.
    pub lookback_days: u32,
    /// Minimum mean volume over the trailing 5 bars.
    pub min_volume: f64,
    /// Result quota per scan.
    pub max_opportunities: usize,
    /// Tickers fetched and classified in parallel.
    pub concurrency: usize,
    /// Per-ticker fetch and classification timeout (ms).
    pub fetch_timeout_ms: u64,
    /// Universe scanned when a request names no tickers.
    pub tickers: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            min_volume: 100_000.0,
            max_opportunities: 5,
            concurrency: 4,
            fetch_timeout_ms: 15_000,
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl ScanConfig {
    /// Scan request over the configured universe with configured limits.
    pub fn default_request(&self) -> ScanRequest {
        ScanRequest {
            tickers: self.tickers.clone(),
            lookback_days: self.lookback_days,
            min_volume: self.min_volume,
            max_opportunities: self.max_opportunities,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file, or `:memory:`.
    pub database_path: String,
    /// Bearer token required on API calls. Unset disables authentication.
    pub api_key: Option<String>,
    /// Name recorded on agent action rows.
    pub agent_name: String,
    pub scan: ScanConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = ScanConfig::default();

        let tickers = env::var("TICKER_UNIVERSE")
            .ok()
            .map(|s| parse_ticker_list(&s))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.tickers);

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8001),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "trading_agent.db".to_string()),
            api_key: env::var("AGENT_API_KEY").ok().filter(|k| !k.is_empty()),
            agent_name: env::var("AGENT_NAME")
                .unwrap_or_else(|_| "technical_researcher".to_string()),
            scan: ScanConfig {
                lookback_days: env::var("SCAN_LOOKBACK_DAYS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.lookback_days),
                min_volume: env::var("SCAN_MIN_VOLUME")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.min_volume),
                max_opportunities: env::var("SCAN_MAX_OPPORTUNITIES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_opportunities),
                concurrency: env::var("SCAN_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|&n: &usize| n > 0)
                    .unwrap_or(defaults.concurrency),
                fetch_timeout_ms: env::var("SCAN_FETCH_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.fetch_timeout_ms),
                tickers,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Parse a comma separated ticker list, uppercasing and dropping blanks.
pub fn parse_ticker_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_default_values() {
        let scan = ScanConfig::default();
        assert_eq!(scan.lookback_days, 60);
        assert_eq!(scan.min_volume, 100_000.0);
        assert_eq!(scan.max_opportunities, 5);
        assert_eq!(scan.concurrency, 4);
        assert_eq!(scan.fetch_timeout_ms, 15_000);
        assert_eq!(scan.tickers.len(), 49);
        assert_eq!(scan.tickers[0], "AAPL");
        assert_eq!(scan.tickers.last().map(String::as_str), Some("XLV"));
    }

    #[test]
    fn test_default_universe_has_no_duplicates() {
        let mut sorted = DEFAULT_TICKERS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), DEFAULT_TICKERS.len());
    }

    #[test]
    fn test_parse_ticker_list() {
        assert_eq!(
            parse_ticker_list(" aapl, msft ,,brk.b "),
            vec!["AAPL".to_string(), "MSFT".to_string(), "BRK.B".to_string()]
        );
        assert!(parse_ticker_list(" , ").is_empty());
    }

    #[test]
    fn test_default_request() {
        let scan = ScanConfig {
            max_opportunities: 3,
            tickers: vec!["SPY".to_string()],
            ..ScanConfig::default()
        };
        let request = scan.default_request();
        assert_eq!(request.tickers, vec!["SPY".to_string()]);
        assert_eq!(request.max_opportunities, 3);
        assert_eq!(request.lookback_days, 60);
    }

    #[test]
    fn test_config_struct_literal() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8001,
            database_path: ":memory:".to_string(),
            api_key: Some("secret".to_string()),
            agent_name: "technical_researcher".to_string(),
            scan: ScanConfig::default(),
        };

        let cloned = config.clone();
        assert_eq!(cloned.port, 8001);
        assert_eq!(cloned.api_key.as_deref(), Some("secret"));
        assert_eq!(cloned.database_path, ":memory:");
    }
}
