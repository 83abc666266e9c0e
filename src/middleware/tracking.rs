use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::AuthenticatedUser;
use crate::metrics::CounterStore;

/// Counts the request, marks its caller active and times it per endpoint.
///
/// The endpoint key is `"METHOD route"`, using the matched route template
/// (`/api/order/:id`) when routing found one and the raw path otherwise.
/// Latency is recorded by a drop guard, so it lands even when the handler
/// future is dropped early.
pub async fn track_requests(
    State(store): State<Arc<CounterStore>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_owned();
    store.record_request(&method);

    if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
        store.mark_user_active(&user.id);
    }

    let route = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };
    let _timer = store.start_endpoint_timer(format!("{method} {route}"));

    next.run(req).await
}
