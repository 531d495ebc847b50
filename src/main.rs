//! Disaster Feed - aggregates public disaster feeds for emergency coordination.
//!
//! # API Endpoints
//!
//! - `GET /disasters` - Current ranked disaster list
//! - `POST /disasters/refresh` - Refresh all feeds now
//! - `GET /disasters/summary` - Counts by type and severity
//! - `GET /disasters/nearby` - Disasters near a location
//! - `GET /location` / `POST /location` - Location reference
//! - `POST /location/refresh` - Re-query the location provider
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use disaster_feed::api::{AppState, router};
use disaster_feed::config::Config;
use disaster_feed::feed::DisasterFeed;
use disaster_feed::geolocation::{
    FixedLocationProvider, LocationProvider, LocationTracker, UnsupportedLocationProvider,
};
use disaster_feed::monitor::Monitor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("disaster_feed=info".parse()?))
        .init();

    let config = Config::from_env()?;

    info!(
        port = config.port,
        firms_enabled = config.firms_map_key.is_some(),
        refresh_secs = config.refresh_interval.as_secs(),
        location_refresh_secs = config.location_refresh_interval.as_secs(),
        "Starting disaster feed server"
    );

    let provider: Arc<dyn LocationProvider> = match config.origin {
        Some(origin) => Arc::new(FixedLocationProvider::new(origin, None)),
        None => Arc::new(UnsupportedLocationProvider),
    };

    let feed = DisasterFeed::new(config.aggregator());
    let tracker = LocationTracker::new(provider);

    let monitor = Monitor::start(
        feed.clone(),
        tracker.clone(),
        config.refresh_interval,
        config.location_refresh_interval,
    );

    let app = router(AppState { feed, tracker })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Disaster feed is listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    monitor.shutdown().await;
    info!("Disaster feed stopped");

    Ok(())
}
