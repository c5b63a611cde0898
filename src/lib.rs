//! Scout - technical setup scanner with a versioned opportunity ledger

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use config::Config;
use services::{Ledger, OpportunityStore, Scanner};
use sources::MarketDataSource;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn OpportunityStore>,
    pub ledger: Arc<Ledger>,
    pub scanner: Arc<Scanner>,
}

impl AppState {
    /// Wire the ledger and scanner around a store and a data source.
    pub fn new(
        config: Config,
        store: Arc<dyn OpportunityStore>,
        source: Arc<dyn MarketDataSource>,
    ) -> Self {
        let ledger = Arc::new(Ledger::new(store.clone()));
        let scanner = Arc::new(Scanner::new(
            source,
            ledger.clone(),
            config.scan.clone(),
            config.agent_name.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            ledger,
            scanner,
        }
    }
}

// Re-export commonly used types
pub use types::*;
