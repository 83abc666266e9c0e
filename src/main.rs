use std::sync::Arc;

use anyhow::Context;
use pizza_telemetry::{
    config::Config,
    metrics::{Reporter, ResourceSampler},
    server, AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ─────────────────────────────────────────
    let path = std::env::var("TELEMETRY_CONFIG").unwrap_or_else(|_| "telemetry.toml".into());
    let config = Config::load(&path).with_context(|| format!("loading configuration from {path}"))?;

    // ── 2. Local diagnostics ─────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        metrics_push = config.metrics.url.is_some() && config.metrics.api_key.is_some(),
        log_push = config.logging.url.is_some() && config.logging.api_key.is_some(),
        period_ms = config.metrics.period_ms,
        "configuration loaded"
    );

    // ── 3. Shared state + reporter ───────────────────────────────
    let state = Arc::new(AppState::new(&config));
    let reporter = Reporter::new(
        Arc::clone(&state.metrics),
        ResourceSampler::from_os(),
        &config.metrics,
    );
    let reporter_handle = tokio::spawn(reporter.run());

    // ── 4. Router ────────────────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("binding {}", config.server.addr))?;
    info!(addr = %config.server.addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server exited with error")?;

    reporter_handle.abort();
    info!("shut down");
    Ok(())
}
