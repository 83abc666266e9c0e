use axum::{
    body::{to_bytes, Body, Bytes, HttpBody},
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::logging::{sanitize, HttpLogRecord, LogShipper};

/// Bodies above this size are passed through without being logged.
const MAX_LOGGED_BODY: u64 = 1024 * 1024;

/// Ships one `http-req` log event per response.
///
/// Bodies are buffered only when their length is known and small; the
/// caller receives the same status, headers and bytes either way.
pub async fn log_http(
    State(logger): State<LogShipper>,
    req: Request,
    next: Next,
) -> Response {
    if !logger.is_configured() {
        return next.run(req).await;
    }

    let authorized = req.headers().contains_key(AUTHORIZATION);
    let method = req.method().as_str().to_owned();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let (parts, body) = req.into_parts();
    let (body, req_bytes) = capture(body).await;
    let response = next.run(Request::from_parts(parts, body)).await;

    let status_code = response.status().as_u16();
    let (parts, body) = response.into_parts();
    let (body, res_bytes) = capture(body).await;

    let record = HttpLogRecord {
        authorized,
        path,
        method,
        status_code,
        req_body: req_bytes.as_deref().and_then(serialize_body),
        res_body: res_bytes.as_deref().and_then(serialize_body),
    };
    let _ = logger.log_http(&record);

    Response::from_parts(parts, body)
}

/// Reads a body of known, bounded size into memory and hands back an
/// equivalent replacement. Anything else is returned untouched.
async fn capture(body: Body) -> (Body, Option<Bytes>) {
    let bounded = matches!(body.size_hint().exact(), Some(len) if len <= MAX_LOGGED_BODY);
    if !bounded {
        return (body, None);
    }
    replay(to_bytes(body, MAX_LOGGED_BODY as usize).await)
}

/// Rebuilds a body from the outcome of buffering it. A read error is
/// handed on as a body that fails with that error.
fn replay(buffered: Result<Bytes, axum::Error>) -> (Body, Option<Bytes>) {
    match buffered {
        Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
        Err(e) => {
            warn!(error = %e, "failed to buffer body for logging");
            let failing = tokio_stream::once(Err::<Bytes, _>(e));
            (Body::from_stream(failing), None)
        }
    }
}

/// JSON text for the log record, or `None` for bodies that cannot be
/// represented (empty or not UTF-8).
fn serialize_body(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let json = match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => value.to_string(),
        Err(_) => serde_json::to_string(std::str::from_utf8(bytes).ok()?).ok()?,
    };
    Some(sanitize(&json))
}
