use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, TelemetryError};

const PUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a push goes and the bearer credential it carries.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub bearer: String,
}

impl Endpoint {
    /// Builds an endpoint only when both halves are configured.
    pub fn from_parts(url: Option<&str>, bearer: Option<String>) -> Option<Self> {
        match (url, bearer) {
            (Some(url), Some(bearer)) if !url.is_empty() && !bearer.is_empty() => Some(Self {
                url: url.to_owned(),
                bearer,
            }),
            _ => None,
        }
    }
}

/// Fire-and-forget JSON POSTer shared by the metrics and log paths.
///
/// Cheap to clone: `reqwest::Client` is an `Arc` internally.
#[derive(Clone)]
pub struct HttpPusher {
    client: reqwest::Client,
    endpoint: Option<Endpoint>,
    label: &'static str,
}

impl HttpPusher {
    pub fn new(endpoint: Option<Endpoint>, label: &'static str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PUSH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            label,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Serializes `body` and spawns one POST of it, returning immediately.
    ///
    /// Returns `None` when no endpoint is configured or the body does not
    /// serialize; nothing is sent. Delivery failures are logged and
    /// otherwise dropped; the handle only lets callers (tests) wait for
    /// the attempt to finish.
    pub fn spawn_post<T: Serialize>(&self, body: &T) -> Option<JoinHandle<()>> {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!(target: "telemetry", sink = self.label, "collector not configured, skipping push");
            return None;
        };
        let payload = match encode(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "telemetry", sink = self.label, error = %e, "dropping unserializable payload");
                return None;
            }
        };
        let client = self.client.clone();
        let label = self.label;

        Some(tokio::spawn(async move {
            match send(&client, &endpoint, payload).await {
                Ok(()) => debug!(target: "telemetry", sink = label, "push delivered"),
                Err(e) => warn!(target: "telemetry", sink = label, error = %e, "push failed"),
            }
        }))
    }
}

/// JSON-encodes a push body.
pub(crate) fn encode<T: Serialize + ?Sized>(body: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}

async fn send(client: &reqwest::Client, endpoint: &Endpoint, payload: Vec<u8>) -> Result<()> {
    let response = client
        .post(&endpoint.url)
        .bearer_auth(&endpoint.bearer)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(TelemetryError::Status { status, body })
}
