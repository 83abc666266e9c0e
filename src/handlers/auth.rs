use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Json,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::middleware::AuthenticatedUser;
use crate::AppState;

use super::AppError;

// ─── Domain types ────────────────────────────────────────────────

/// In-memory accounts and sessions for the demo service.
#[derive(Default)]
pub struct Accounts {
    users: Mutex<HashMap<String, Account>>,
    sessions: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

impl Accounts {
    fn issue_token(&self, user_id: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.lock().insert(token.clone(), user_id.to_owned());
        token
    }

    pub fn user_for_token(&self, token: &str) -> Option<String> {
        self.sessions.lock().get(token).cloned()
    }
}

// ─── POST /api/auth ──────────────────────────────────────────────

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (Some(name), Some(email), Some(password)) = (req.name, req.email, req.password) else {
        return Err(AppError::BadRequest(
            "name, email, and password are required".into(),
        ));
    };

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        email: email.clone(),
    };
    state.accounts.users.lock().insert(
        email,
        Account {
            user: user.clone(),
            password,
        },
    );
    state.logger.log_database(
        "INSERT INTO user (name, email, password) VALUES (?, ?, ?)",
        None,
    );

    let token = state.accounts.issue_token(&user.id);
    Ok(Json(AuthResponse { user, token }))
}

// ─── PUT /api/auth ───────────────────────────────────────────────

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let account = state.accounts.users.lock().get(&req.email).cloned();
    state.logger.log_database(
        "SELECT * FROM user WHERE email=?",
        Some(&serde_json::json!([req.email])),
    );

    match account {
        Some(account) if account.password == req.password => {
            state.metrics.record_auth_attempt(true);
            let token = state.accounts.issue_token(&account.user.id);
            Ok(Json(AuthResponse {
                user: account.user,
                token,
            }))
        }
        _ => {
            state.metrics.record_auth_attempt(false);
            Err(AppError::NotFound("unknown user".into()))
        }
    }
}

// ─── DELETE /api/auth ────────────────────────────────────────────

pub async fn logout(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = bearer_token(&req).ok_or(AppError::Unauthorized)?;
    if state.accounts.sessions.lock().remove(token).is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(serde_json::json!({ "message": "logout successful" })))
}

// ─── Session layer ───────────────────────────────────────────────

/// Resolves a bearer token issued by this service into an
/// [`AuthenticatedUser`] extension. Unknown tokens are ignored.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let user_id = bearer_token(&req).and_then(|t| state.accounts.user_for_token(t));
    if let Some(id) = user_id {
        req.extensions_mut().insert(AuthenticatedUser { id });
    }
    next.run(req).await
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
