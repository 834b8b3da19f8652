use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fresh_ticker::config::{Config, SourceConfig};
use fresh_ticker::db::Database;
use fresh_ticker::routes::{self, AppState};
use fresh_ticker::source::{RestSource, TickerSource};
use fresh_ticker::ticker::TickerEntry;
use fresh_ticker::widget::{TickerWidget, WidgetSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fresh_ticker=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("TICKER_CONFIG").unwrap_or_else(|_| "ticker.toml".to_string());
    let config = Config::load(&config_path)?;
    let fallback = config.fallback_tickers();
    info!(
        "Loaded configuration from {} ({} fallback tickers)",
        config_path,
        fallback.len()
    );

    let source = build_source(&config.source, &fallback).await?;

    let widget = Arc::new(TickerWidget::new(
        source,
        fallback,
        WidgetSettings::from(&config),
    ));
    widget.activate();

    // Create app state
    let state = Arc::new(AppState {
        widget: widget.clone(),
        title: config.title.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(routes::index))
        .route("/ticker", get(routes::ticker))
        .route("/ticker/refresh", post(routes::refresh))
        .route("/api/tickers", get(routes::tickers_json))
        .route("/health", get(routes::health))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Server starting on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    widget.deactivate();
    info!("Server stopped");

    Ok(())
}

async fn build_source(
    config: &SourceConfig,
    fallback: &[TickerEntry],
) -> anyhow::Result<Arc<dyn TickerSource>> {
    match config {
        SourceConfig::Database { url } => {
            let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| url.clone());
            let db = Database::new(&database_url).await?;
            db.initialize().await?;
            if db.seed_if_empty(fallback).await? {
                info!("Seeded empty ticker table with {} rows", fallback.len());
            }
            info!("Database initialized");
            Ok(Arc::new(db))
        }
        SourceConfig::Rest { url, api_key, table } => {
            let source = RestSource::new(url, api_key, table)?;
            info!("Reading tickers from {}", source.endpoint());
            Ok(Arc::new(source))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
