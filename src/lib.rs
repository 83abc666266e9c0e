//! Request telemetry for the pizza service: per-window counters pushed to
//! a metrics collector, and one redacted log event per HTTP exchange
//! pushed to a log collector.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod transport;

use std::sync::Arc;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Window counters, written by middleware and handlers, drained by the reporter.
    pub metrics: Arc<metrics::CounterStore>,

    /// Best-effort log shipping.
    pub logger: logging::LogShipper,

    pub accounts: handlers::auth::Accounts,
    pub orders: handlers::order::Orders,
}

impl AppState {
    pub fn new(config: &config::Config) -> Self {
        Self {
            metrics: Arc::new(metrics::CounterStore::new()),
            logger: logging::LogShipper::new(&config.logging),
            accounts: Default::default(),
            orders: Default::default(),
        }
    }
}
