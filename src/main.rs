//! aerp - air-freight booking bot
//!
//! A Telegram bot that walks shippers through booking, staff through rate
//! and payment approval, and admins through user review and settings.

mod api;
mod blob;
mod config;
mod db;
mod runtime;
mod telegram;
mod workflow;

use api::{create_router, AppState};
use blob::LocalFileSink;
use config::{Config, TransportMode};
use db::Database;
use runtime::{DatabaseStore, EngineConfig, ProductionEngine, UpdateHandler};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerp=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;

    // Ensure storage directories exist
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.files_dir)?;

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let transport = Arc::new(TelegramClient::new(&config.api_url, &config.bot_token)?);
    let files = LocalFileSink::new(&config.files_dir, &config.public_url);
    let engine: Arc<ProductionEngine> = Arc::new(ProductionEngine::new(
        DatabaseStore::new(db),
        files,
        Arc::clone(&transport),
        EngineConfig {
            staff_channel: config.staff_channel,
            admin_ids: config.admin_ids.clone(),
            broadcast_delay: config.broadcast_delay,
            ..EngineConfig::default()
        },
    ));
    tracing::info!(
        staff_channel = config.staff_channel,
        admins = config.admin_ids.len(),
        transport = ?config.transport,
        "Engine ready"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(prune_loop(Arc::clone(&engine), cancel.clone()));

    let handler: Arc<dyn UpdateHandler> = engine;
    let poller = match config.transport {
        TransportMode::Poll => Some(tokio::spawn(telegram::run_polling(
            Arc::clone(&transport),
            Arc::clone(&handler),
            cancel.clone(),
        ))),
        TransportMode::Webhook => None,
    };

    let state = AppState {
        handler,
        webhook_secret: config.webhook_secret.clone(),
        files_dir: config.files_dir.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server; in poll mode it still serves proof files
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("aerp server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    if let Some(poller) = poller {
        poller.await?;
    }
    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn prune_loop(engine: Arc<ProductionEngine>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = engine.prune_claims().await {
                    tracing::warn!(error = %e, "Claim pruning failed");
                }
            }
        }
    }
}

/// Resolve on SIGTERM or SIGINT
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Signal handlers unavailable, falling back to ctrl-c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl-c handler failed");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        _ = sigint.recv() => tracing::info!("Received SIGINT"),
    }
}
