use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use avinor_backend::config::BackendConfig;
use avinor_backend::module::airports::AirportDirectory;
use avinor_backend::module::detail::DetailClient;
use avinor_backend::module::feed::FeedClient;
use avinor_backend::registry::FeedRegistry;
use avinor_backend::server::{self, AppState};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = BackendConfig::load_or_default(&config_path)?;

    // Initialize logging
    let _logging_guard =
        avinor_backend::logging::init_logging(&config.log_dir, "avinor-backend", &config.log_level)?;

    info!("Avinor Backend starting...");
    if !config_path.exists() {
        warn!("Config file {} not found, using defaults", config_path.display());
    }

    let feed = Arc::new(FeedClient::new(config.feed_base_url.as_str())?);
    let detail = DetailClient::new(config.detail_base_url.as_str())?;
    let airports = Arc::new(AirportDirectory::with_ttl(
        feed.clone(),
        chrono::Duration::hours(config.airport_cache_hours),
    ));

    // Start one coordinator per configured feed
    let registry = Arc::new(FeedRegistry::new(
        feed,
        Duration::from_secs(config.update_interval_seconds),
    ));
    let summary = registry.apply(config.feeds.clone()).await;
    info!("Started {} feed(s)", summary.started.len());
    server::unknown_feed_airports(&airports, &config.feeds).await;

    let state = AppState {
        registry: registry.clone(),
        airports,
        detail,
        detail_api_key: config.detail_api_key().map(str::to_string),
        config_path,
    };
    let app = server::router(state);

    let addr = config.server_address();
    info!("HTTP server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    registry.shutdown().await;
    info!("Avinor Backend stopped");
    Ok(())
}
