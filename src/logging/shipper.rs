use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::warn;

use super::sanitize::sanitize;
use crate::config::LoggingConfig;
use crate::error::TelemetryError;
use crate::metrics::record::now_unix_nanos;
use crate::transport::{Endpoint, HttpPusher};

// ─── Event types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    #[serde(rename = "http-req")]
    HttpRequest,
    #[serde(rename = "db-req")]
    DatabaseRequest,
    #[serde(rename = "factory-req")]
    FactoryRequest,
    #[serde(rename = "exception")]
    Exception,
}

/// One sanitized log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub event_type: EventType,
    pub timestamp_ns: u64,
    /// Serialized, already-redacted JSON.
    pub payload: String,
}

/// What the HTTP interceptor observed for one exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpLogRecord {
    pub authorized: bool,
    pub path: String,
    pub method: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub res_body: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseLog<'a> {
    sql: &'a str,
    params: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FactoryLog {
    factory_request: String,
    factory_response: String,
    status_code: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExceptionLog<'a> {
    message: &'a str,
    path: &'a str,
    method: &'a str,
    status_code: u16,
}

// ─── Wire format ─────────────────────────────────────────────────

/// Request body of one log push: a single stream with a single value.
#[derive(Debug, Serialize)]
pub struct LogPush {
    streams: [LogStream; 1],
}

#[derive(Debug, Serialize)]
struct LogStream {
    stream: StreamLabels,
    values: [[String; 2]; 1],
}

#[derive(Debug, Serialize)]
struct StreamLabels {
    component: String,
    level: LogLevel,
    #[serde(rename = "type")]
    event_type: EventType,
}

impl LogEvent {
    pub fn into_push(self, component: &str) -> LogPush {
        LogPush {
            streams: [LogStream {
                stream: StreamLabels {
                    component: component.to_owned(),
                    level: self.level,
                    event_type: self.event_type,
                },
                values: [[self.timestamp_ns.to_string(), self.payload]],
            }],
        }
    }
}

// ─── Shipper ─────────────────────────────────────────────────────

/// Maps a response status to a severity.
pub fn status_to_level(status: u16) -> LogLevel {
    if status >= 500 {
        LogLevel::Error
    } else if status >= 400 {
        LogLevel::Warn
    } else {
        LogLevel::Info
    }
}

/// Builds, redacts and pushes log events to the log collector.
///
/// Serialized bodies embedded as strings are redacted before embedding,
/// since their escaped quotes hide them from the outer pass.
///
/// Every entry point returns the spawned delivery, or `None` when nothing
/// was sent (collector not configured, or the payload failed to
/// serialize).
#[derive(Clone)]
pub struct LogShipper {
    component: String,
    pusher: HttpPusher,
}

impl LogShipper {
    pub fn new(config: &LoggingConfig) -> Self {
        let bearer = config.api_key.as_ref().map(|key| {
            format!("{}:{}", config.user_id.as_deref().unwrap_or_default(), key)
        });
        Self {
            component: config.source.clone(),
            pusher: HttpPusher::new(Endpoint::from_parts(config.url.as_deref(), bearer), "logs"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.pusher.is_configured()
    }

    /// Serializes and redacts `data` into an event.
    pub fn event<T: Serialize>(level: LogLevel, event_type: EventType, data: &T) -> Option<LogEvent> {
        match serde_json::to_string(data).map_err(TelemetryError::from) {
            Ok(json) => Some(LogEvent {
                level,
                event_type,
                timestamp_ns: now_unix_nanos(),
                payload: sanitize(&json),
            }),
            Err(e) => {
                warn!(error = %e, ?event_type, "dropping unserializable log event");
                None
            }
        }
    }

    pub fn log<T: Serialize>(
        &self,
        level: LogLevel,
        event_type: EventType,
        data: &T,
    ) -> Option<JoinHandle<()>> {
        if !self.is_configured() {
            return None;
        }
        let event = Self::event(level, event_type, data)?;
        self.pusher.spawn_post(&event.into_push(&self.component))
    }

    pub fn log_http(&self, record: &HttpLogRecord) -> Option<JoinHandle<()>> {
        self.log(
            status_to_level(record.status_code),
            EventType::HttpRequest,
            record,
        )
    }

    pub fn log_database(&self, sql: &str, params: Option<&Value>) -> Option<JoinHandle<()>> {
        let data = DatabaseLog {
            sql,
            params: params.map(|p| sanitize(&p.to_string())),
        };
        self.log(LogLevel::Info, EventType::DatabaseRequest, &data)
    }

    pub fn log_factory_request(
        &self,
        request: &Value,
        response: &Value,
        status: u16,
    ) -> Option<JoinHandle<()>> {
        let data = FactoryLog {
            factory_request: sanitize(&request.to_string()),
            factory_response: sanitize(&response.to_string()),
            status_code: status,
        };
        self.log(status_to_level(status), EventType::FactoryRequest, &data)
    }

    pub fn log_exception(
        &self,
        message: &str,
        path: &str,
        method: &str,
        status: u16,
    ) -> Option<JoinHandle<()>> {
        let data = ExceptionLog {
            message,
            path,
            method,
            status_code: status,
        };
        self.log(LogLevel::Error, EventType::Exception, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configured(url: String) -> LoggingConfig {
        let mut config = Config::default().logging;
        config.url = Some(url);
        config.user_id = Some("1234".into());
        config.api_key = Some("glc_key".into());
        config
    }

    async fn pushed_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[test]
    fn status_maps_to_level() {
        assert_eq!(status_to_level(200), LogLevel::Info);
        assert_eq!(status_to_level(302), LogLevel::Info);
        assert_eq!(status_to_level(404), LogLevel::Warn);
        assert_eq!(status_to_level(499), LogLevel::Warn);
        assert_eq!(status_to_level(500), LogLevel::Error);
        assert_eq!(status_to_level(503), LogLevel::Error);
    }

    #[test]
    fn push_shape_has_labels_and_one_value() {
        let event = LogEvent {
            level: LogLevel::Warn,
            event_type: EventType::HttpRequest,
            timestamp_ns: 1_700_000_000_123_456_789,
            payload: r#"{"a":1}"#.into(),
        };
        assert_eq!(
            serde_json::to_value(event.into_push("svc")).unwrap(),
            json!({
                "streams": [{
                    "stream": {"component": "svc", "level": "warn", "type": "http-req"},
                    "values": [["1700000000123456789", "{\"a\":1}"]]
                }]
            })
        );
    }

    #[test]
    fn event_payload_is_sanitized() {
        let event = LogShipper::event(
            LogLevel::Info,
            EventType::DatabaseRequest,
            &json!({"sql": "SELECT 1", "password": "hunter2"}),
        )
        .unwrap();
        assert!(!event.payload.contains("hunter2"));
        assert!(event.timestamp_ns > 0);
    }

    #[test]
    fn unserializable_event_is_dropped() {
        let mut data = std::collections::BTreeMap::new();
        data.insert((1, 2), "x");
        assert!(LogShipper::event(LogLevel::Info, EventType::Exception, &data).is_none());
    }

    #[tokio::test]
    async fn unconfigured_shipper_is_a_no_op() {
        let shipper = LogShipper::new(&Config::default().logging);
        assert!(shipper.log_exception("boom", "/", "GET", 500).is_none());
    }

    #[tokio::test]
    async fn bearer_combines_user_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer 1234:glc_key"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let shipper = LogShipper::new(&configured(server.uri()));
        shipper
            .log_database("SELECT * FROM user WHERE id=?", Some(&json!([1])))
            .unwrap()
            .await
            .unwrap();

        let body = &pushed_bodies(&server).await[0];
        let labels = &body["streams"][0]["stream"];
        assert_eq!(labels["type"], "db-req");
        assert_eq!(labels["level"], "info");
        assert_eq!(labels["component"], "jwt-pizza-service");
        let payload: Value =
            serde_json::from_str(body["streams"][0]["values"][0][1].as_str().unwrap()).unwrap();
        assert_eq!(payload["params"], "[1]");
    }

    #[tokio::test]
    async fn factory_and_exception_events_carry_levels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let shipper = LogShipper::new(&configured(server.uri()));
        shipper
            .log_factory_request(
                &json!({"diner": {"id": 1}}),
                &json!({"jwt": "x", "token": "factory-secret"}),
                500,
            )
            .unwrap()
            .await
            .unwrap();
        shipper
            .log_exception("db down", "/api/order", "POST", 500)
            .unwrap()
            .await
            .unwrap();

        let bodies = pushed_bodies(&server).await;
        assert_eq!(bodies[0]["streams"][0]["stream"]["type"], "factory-req");
        assert_eq!(bodies[0]["streams"][0]["stream"]["level"], "error");
        assert!(!bodies[0].to_string().contains("factory-secret"));
        assert_eq!(bodies[1]["streams"][0]["stream"]["type"], "exception");
        assert_eq!(bodies[1]["streams"][0]["stream"]["level"], "error");
    }

    #[tokio::test]
    async fn collector_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let shipper = LogShipper::new(&configured(server.uri()));
        let record = HttpLogRecord {
            authorized: false,
            path: "/".into(),
            method: "GET".into(),
            status_code: 200,
            req_body: None,
            res_body: None,
        };
        assert!(shipper.log_http(&record).unwrap().await.is_ok());
    }
}
