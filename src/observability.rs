//! Logging setup for the `secret-broker` binary and embedding applications.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the caller. [`init_logging`] is the stock way to do it.

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::error::{Result, SecretsError};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = SecretsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(SecretsError::invalid_config(format!(
                "invalid log format '{}', expected 'text' or 'json'",
                other
            ))),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `secret_broker=debug,reqwest=warn`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

impl LoggingConfig {
    /// Reads `RUST_LOG`, then `SECRETS_LOG_LEVEL`, and `SECRETS_LOG_FORMAT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(level) = get("RUST_LOG").or_else(|| get("SECRETS_LOG_LEVEL")) {
            config.level = level;
        }
        if let Some(format) = get("SECRETS_LOG_FORMAT") {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            SecretsError::invalid_config(format!("invalid log filter '{}': {}", self.level, e))
        })
    }
}

/// Installs a global `fmt` subscriber.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = config.filter()?;
    let builder = FmtSubscriber::builder().with_env_filter(filter).with_target(true);

    let installed = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    };
    installed.map_err(|e| {
        SecretsError::invalid_config(format!("logging already initialized: {}", e))
    })
}
