//! # Structured Logging
//!
//! `tracing` subscriber construction for kindred processes. The subscriber is
//! never installed globally: a [`LoggingContext`] owns it and scopes it to a
//! runner, either as the thread default or attached to a future.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, EnvFilter};

use crate::config::ConfigError;
use crate::errors::{CoreError, CoreResult};

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::invalid_value("log_format", s, "plain, pretty, or json")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match self {
            LogFormat::Plain => "plain",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        };
        write!(f, "{}", format)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    pub format: LogFormat,
    /// Include file and line number information
    pub include_location: bool,
    /// Environment filter (supports directives like "kindred=debug,warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            include_location: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Create development logging configuration
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            env_filter: None,
        }
    }

    /// Create test logging configuration (minimal output)
    pub fn test() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Plain,
            include_location: false,
            env_filter: None,
        }
    }

    /// Create production logging configuration
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
            env_filter: None,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn filter(&self) -> CoreResult<EnvFilter> {
        let directives = self.env_filter.as_deref().unwrap_or(&self.level);
        EnvFilter::try_new(directives).map_err(|e| CoreError::Logging {
            message: format!("invalid filter '{}': {}", directives, e),
        })
    }

    /// Build a subscriber for this configuration without installing it
    pub fn dispatch(&self) -> CoreResult<Dispatch> {
        let filter = self.filter()?;
        let layer = Layer::new()
            .with_writer(io::stderr)
            .with_file(self.include_location)
            .with_line_number(self.include_location);

        let dispatch = match self.format {
            LogFormat::Json => Dispatch::new(tracing_subscriber::registry().with(filter).with(layer.json())),
            LogFormat::Pretty => Dispatch::new(tracing_subscriber::registry().with(filter).with(layer.pretty())),
            LogFormat::Plain => Dispatch::new(tracing_subscriber::registry().with(filter).with(layer)),
        };
        Ok(dispatch)
    }
}

/// Scoped logging for one run
///
/// While installed, the subscriber is the default for the current thread;
/// dropping the context restores whatever was there before.
pub struct LoggingContext {
    dispatch: Dispatch,
    guard: Option<DefaultGuard>,
}

impl LoggingContext {
    pub fn new(config: &LoggingConfig) -> CoreResult<Self> {
        Ok(Self {
            dispatch: config.dispatch()?,
            guard: None,
        })
    }

    /// Make the subscriber the current thread's default until drop
    pub fn install(mut self) -> Self {
        if self.guard.is_none() {
            self.guard = Some(dispatcher::set_default(&self.dispatch));
        }
        self
    }

    pub fn is_installed(&self) -> bool {
        self.guard.is_some()
    }

    /// Subscriber handle, for attaching to futures
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

impl fmt::Debug for LoggingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingContext")
            .field("installed", &self.is_installed())
            .finish()
    }
}
