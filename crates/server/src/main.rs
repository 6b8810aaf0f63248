mod api;
mod bootstrap;
mod health;
mod trace;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use switchboard_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;
use tokio::sync::Notify;

fn init_logging(config: &AppConfig) {
    use switchboard_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("could not bind {address}"))?;

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    let server = axum::serve(listener, api::router(app.state))
        .with_graceful_shutdown(async move { signal.notified().await });
    let mut server = tokio::spawn(async move { server.await });

    tracing::info!(
        event_name = "system.server.started",
        trace_id = "bootstrap",
        address = %address,
        "switchboard-server listening"
    );

    tokio::select! {
        finished = &mut server => {
            finished.context("server task panicked")?.context("server stopped unexpectedly")?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("could not listen for the shutdown signal")?;
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        trace_id = "shutdown",
        grace_secs = app.config.server.graceful_shutdown_secs,
        "draining in-flight requests"
    );
    shutdown.notify_one();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(finished) => {
            finished.context("server task panicked")?.context("server stopped with an error")?;
        }
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                trace_id = "shutdown",
                "grace period elapsed with requests still in flight"
            );
        }
    }

    tracing::info!(event_name = "system.server.stopped", trace_id = "shutdown", "server stopped");
    Ok(())
}
