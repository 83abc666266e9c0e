use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::middleware::{log_http, track_requests};
use crate::AppState;

/// Builds the full Axum `Router` with all routes and telemetry middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::welcome))
        // ── Auth ────────────────────────────────────────────────
        .route(
            "/api/auth",
            post(handlers::auth::register)
                .put(handlers::auth::login)
                .delete(handlers::auth::logout),
        )
        // ── Orders ──────────────────────────────────────────────
        .route(
            "/api/order",
            get(handlers::order::list_orders).post(handlers::order::create_order),
        )
        .route("/api/order/:id", get(handlers::order::get_order))
        .fallback(handlers::unknown_endpoint)
        .with_state(Arc::clone(&state))
        // ── Middleware (applied bottom-up: last added runs first) ─
        .layer(axum_mw::from_fn_with_state(
            Arc::clone(&state.metrics),
            track_requests,
        ))
        .layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            handlers::auth::authenticate,
        ))
        .layer(axum_mw::from_fn_with_state(state.logger.clone(), log_http))
        .layer(CorsLayer::permissive())
}
