use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

use notelink::{
    app_state::AppState,
    config::{Config, environment::RuntimeEnvironment},
    logging, pipeline, routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    logging::init(config.json_logs());

    let environment = RuntimeEnvironment::detect();
    let orchestrator = Arc::new(pipeline::from_config(&config, &environment)?);
    let state = AppState::new(orchestrator.clone(), environment, &config);

    spawn_rate_limit_sweeper(&state, config.rate_limit_window_secs());

    let app = routes::router(state);
    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr()))?;
    info!(addr = config.bind_addr(), "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    orchestrator.close();
    info!("Shut down");
    Ok(())
}

fn spawn_rate_limit_sweeper(state: &AppState, window_secs: i64) {
    let rate_limit = state.rate_limit.clone();
    let period = Duration::from_secs(window_secs.max(1) as u64);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let removed = rate_limit.purge_expired(chrono::Utc::now());
            if removed > 0 {
                tracing::debug!(removed, "Swept idle rate limit entries");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Received shutdown signal, draining connections...");
}
