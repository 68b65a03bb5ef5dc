/// Structured logging for the flood risk service
///
/// Output goes through `tracing`; this module installs the subscriber and
/// owns the failure classification for observation sources so that an
/// offline gauge reads differently in the logs from a broken upstream.
///
/// Environment:
///   FLOOD_LOG_LEVEL   tracing filter directive, default `info`
///   FLOOD_LOG_FORMAT  `pretty` (default) or `json`
///   FLOOD_LOG_TARGET  include module targets, default true

use crate::acquire::AcquisitionStrategy;
use crate::model::SourceError;
use std::env;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Subscriber configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `FLOOD_LOG_*` values; unparseable values keep
    /// the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup("FLOOD_LOG_LEVEL") {
            let trimmed = level.trim();
            if !trimmed.is_empty() {
                config.level = trimmed.to_string();
            }
        }
        if let Some(format) = lookup("FLOOD_LOG_FORMAT").and_then(|v| parse_log_format(&v)) {
            config.format = format;
        }
        if let Some(target) = lookup("FLOOD_LOG_TARGET").and_then(|v| parse_bool(&v)) {
            config.include_target = target;
        }
        config
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target)
        .with_ansi(config.format == LogFormat::Pretty);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Gauge is known to the source but unavailable (404, decommissioned).
    Expected,
    /// Service degradation, timeouts, or a response format change.
    Unexpected,
    /// Source answered without readings; may be seasonal or offline.
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

pub fn classify_source_failure(err: &SourceError) -> FailureType {
    match err {
        SourceError::NoData(_) => FailureType::Unknown,
        SourceError::Http(404) => FailureType::Expected,
        SourceError::Http(_) | SourceError::Transport(_) | SourceError::Parse(_) => FailureType::Unexpected,
    }
}

/// Logs one failed acquisition attempt at a level matching its class.
pub fn log_source_failure(site_code: &str, strategy: AcquisitionStrategy, err: &SourceError) {
    let failure = classify_source_failure(err);
    match failure {
        FailureType::Unexpected => error!(
            site = site_code,
            strategy = %strategy,
            failure = %failure,
            error = %err,
            "observation fetch failed"
        ),
        FailureType::Expected | FailureType::Unknown => warn!(
            site = site_code,
            strategy = %strategy,
            failure = %failure,
            error = %err,
            "observation fetch failed"
        ),
    }
}
