use axum::{
    extract::{Path, State},
    Extension, Json,
};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::middleware::AuthenticatedUser;
use crate::AppState;

use super::AppError;

/// The simulated factory refuses orders larger than this.
const FACTORY_MAX_ITEMS: usize = 20;

// ─── Domain types ────────────────────────────────────────────────

/// Orders per user id.
#[derive(Default)]
pub struct Orders {
    by_user: Mutex<HashMap<String, Vec<Order>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: String,
    pub items: Vec<OrderItem>,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: Order,
    pub jwt: String,
}

// ─── GET /api/order ──────────────────────────────────────────────

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<Vec<Order>>, AppError> {
    let Extension(user) = user.ok_or(AppError::Unauthorized)?;
    let orders = state
        .orders
        .by_user
        .lock()
        .get(&user.id)
        .cloned()
        .unwrap_or_default();
    Ok(Json(orders))
}

// ─── GET /api/order/:id ──────────────────────────────────────────

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let Extension(user) = user.ok_or(AppError::Unauthorized)?;
    let order = state
        .orders
        .by_user
        .lock()
        .get(&user.id)
        .and_then(|orders| orders.iter().find(|o| o.id == id).cloned());
    order
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order '{id}' not found")))
}

// ─── POST /api/order ─────────────────────────────────────────────

/// Places an order with the (simulated) pizza factory and records the
/// purchase outcome, latency and price.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let Extension(user) = user.ok_or(AppError::Unauthorized)?;
    if req.items.is_empty() {
        return Err(AppError::BadRequest("order has no items".into()));
    }

    let order = Order {
        id: uuid::Uuid::new_v4().to_string(),
        total: req.items.iter().map(|i| i.price).sum(),
        items: req.items,
    };

    let t0 = Instant::now();
    let factory_request = serde_json::json!({
        "diner": { "id": user.id },
        "order": order,
    });
    let outcome = bake(&order).await;
    let latency_ms = t0.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(jwt) => {
            state.metrics.record_purchase(true, latency_ms, order.total);
            state.logger.log_factory_request(
                &factory_request,
                &serde_json::json!({ "jwt": jwt }),
                200,
            );
            state
                .orders
                .by_user
                .lock()
                .entry(user.id)
                .or_default()
                .push(order.clone());
            Ok(Json(OrderResponse { order, jwt }))
        }
        Err(reason) => {
            state.metrics.record_purchase(false, latency_ms, order.total);
            state.logger.log_factory_request(
                &factory_request,
                &serde_json::json!({ "message": reason }),
                500,
            );
            let err = AppError::Factory(reason);
            state
                .logger
                .log_exception(&err.message(), "/api/order", "POST", err.status().as_u16());
            Err(err)
        }
    }
}

/// Stand-in for the remote factory call.
async fn bake(order: &Order) -> Result<String, String> {
    let delay = rand::thread_rng().gen_range(5..=50);
    tokio::time::sleep(Duration::from_millis(delay)).await;

    if order.items.len() > FACTORY_MAX_ITEMS {
        return Err(format!("too many pizzas ({})", order.items.len()));
    }
    Ok(uuid::Uuid::new_v4().simple().to_string())
}
