use axum::Router;
use scout::config::Config;
use scout::services::{OpportunityStore, SqliteStore};
use scout::sources::YahooFinanceClient;
use scout::{api, AppState};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Starting Scout server on {}:{}", config.host, config.port);

    if config.api_key.is_none() {
        warn!("AGENT_API_KEY not set - API authentication is disabled");
    }

    let store: Arc<dyn OpportunityStore> = if config.database_path == ":memory:" {
        Arc::new(SqliteStore::new_in_memory()?)
    } else {
        Arc::new(SqliteStore::new(&config.database_path)?)
    };
    info!("Opportunity store at {}", config.database_path);

    let source = Arc::new(YahooFinanceClient::new()?);
    info!(
        "Scan universe: {} tickers, concurrency {}",
        config.scan.tickers.len(),
        config.scan.concurrency
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, store, source);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Scout server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
