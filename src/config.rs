//! Configuration for the telemetry core and the demo service.
//!
//! Sources are layered with `figment`: built-in defaults, then an optional
//! TOML file, then `TELEMETRY_`-prefixed environment variables
//! (`TELEMETRY_METRICS__URL=...`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TelemetryError};

// ─── Defaults ────────────────────────────────────────────────────

const DEFAULT_SOURCE: &str = "jwt-pizza-service";
const DEFAULT_PERIOD_MS: u64 = 10_000;

// ─── Types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Filter directive handed to `tracing-subscriber`.
    pub log_level: String,
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub addr: String,
}

/// Metrics collector settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Value of the `source` attribute on every record.
    pub source: String,
    /// Reporter tick period. Per-minute rates are derived from it.
    pub period_ms: u64,
}

/// Log collector settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub url: Option<String>,
    pub user_id: Option<String>,
    pub api_key: Option<String>,
    /// Value of the `component` stream label.
    pub source: String,
}

// ─── Impl ────────────────────────────────────────────────────────

impl Config {
    /// Layers defaults, the TOML file at `path` (if it exists) and the
    /// environment, then validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TELEMETRY_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.period_ms == 0 {
            return Err(TelemetryError::InvalidConfig(
                "metrics.period_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl MetricsConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Factor turning a per-window count into a per-minute rate.
    pub fn rate_multiplier(&self) -> f64 {
        60_000.0 / self.period_ms as f64
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            server: ServerConfig {
                addr: "0.0.0.0:3000".into(),
            },
            metrics: MetricsConfig {
                url: None,
                api_key: None,
                source: DEFAULT_SOURCE.into(),
                period_ms: DEFAULT_PERIOD_MS,
            },
            logging: LoggingConfig {
                url: None,
                user_id: None,
                api_key: None,
                source: DEFAULT_SOURCE.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_period_yields_six_windows_per_minute() {
        let config = Config::default();
        assert_eq!(config.metrics.period(), Duration::from_secs(10));
        assert_eq!(config.metrics.rate_multiplier(), 6.0);
    }

    #[test]
    fn multiplier_follows_configured_period() {
        let mut metrics = Config::default().metrics;
        metrics.period_ms = 30_000;
        assert_eq!(metrics.rate_multiplier(), 2.0);
        metrics.period_ms = 5_000;
        assert_eq!(metrics.rate_multiplier(), 12.0);
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut config = Config::default();
        config.metrics.period_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[metrics]
url = "https://collector.example/otlp/v1/metrics"
api_key = "abc"
period_ms = 20000

[logging]
url = "https://logs.example/loki/api/v1/push"
user_id = "42"
api_key = "xyz"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.metrics.url.as_deref(),
            Some("https://collector.example/otlp/v1/metrics")
        );
        assert_eq!(config.metrics.rate_multiplier(), 3.0);
        assert_eq!(config.metrics.source, DEFAULT_SOURCE);
        assert_eq!(config.logging.user_id.as_deref(), Some("42"));
        assert_eq!(config.server.addr, "0.0.0.0:3000");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert!(config.metrics.url.is_none());
        assert!(config.logging.api_key.is_none());
        assert_eq!(config.metrics.period_ms, DEFAULT_PERIOD_MS);
    }
}
