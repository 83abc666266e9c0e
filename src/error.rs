use thiserror::Error;

/// Everything that can go wrong inside the telemetry path.
///
/// None of these ever reach request handling: push paths log them and
/// drop the payload.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector responded with HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<figment::Error> for TelemetryError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
