pub mod http_log;
pub mod tracking;

pub use http_log::log_http;
pub use tracking::track_requests;

/// Caller identity attached to a request by the authentication layer.
///
/// The telemetry middleware only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}
