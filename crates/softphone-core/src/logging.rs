//! Logging setup for applications embedding the softphone core
//!
//! The library itself only emits `tracing` events. Hosts that do not bring
//! their own subscriber can install one from a [`LoggingConfig`], typically
//! loaded next to the [`SoftphoneConfig`](crate::SoftphoneConfig).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ClientError, ClientResult};

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level, e.g. `"info"`
    pub level: String,
    /// Extra filter directives, e.g. `"softphone_core::watchdog=debug"`
    pub directives: Vec<String>,
    /// Print source file and line of each event
    pub file_info: bool,
    /// Log span open/close
    pub log_spans: bool,
    /// Name printed in the startup line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            file_info: false,
            log_spans: false,
            app_name: "softphone".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        Self {
            level: level.to_string().to_lowercase(),
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Add a per-target directive on top of the base level
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    /// Build the event filter: `RUST_LOG`, then the base level, then the directives
    pub fn filter(&self) -> ClientResult<EnvFilter> {
        let mut filter = EnvFilter::from_default_env().add_directive(parse_log_level(&self.level)?.into());
        for raw in &self.directives {
            let directive = Directive::from_str(raw).map_err(|e| ClientError::InvalidConfiguration {
                field: "logging.directives".to_string(),
                reason: format!("{}: {}", raw, e),
            })?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Install a global `tracing` subscriber
///
/// Fails with [`ClientError::InternalError`] if the process already has one.
pub fn setup_logging(config: &LoggingConfig) -> ClientResult<()> {
    let filter = config.filter()?;
    let span_events = if config.log_spans { FmtSpan::ACTIVE } else { FmtSpan::NONE };

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .try_init()
        .map_err(|e| ClientError::internal_error(format!("failed to install logger: {}", e)))?;

    tracing::info!(app = %config.app_name, version = crate::VERSION, "Logging initialized");
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> ClientResult<Level> {
    Level::from_str(level).map_err(|_| ClientError::InvalidConfiguration {
        field: "logging.level".to_string(),
        reason: format!("invalid log level: {}", level),
    })
}
