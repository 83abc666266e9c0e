pub mod auth;
pub mod order;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unauthorized,
    Factory(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Factory(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::Unauthorized => "unauthorized".into(),
            Self::Factory(msg) => format!("Failed to fulfill order at factory: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "message": self.message(),
            "status":  status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

// ─── GET / and fallback ──────────────────────────────────────────

pub async fn welcome() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "welcome to JWT Pizza",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn unknown_endpoint() -> AppError {
    AppError::NotFound("unknown endpoint".into())
}
