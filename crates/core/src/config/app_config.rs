use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::config::{validate_log_level, ConfigError, ConfigSource};
use crate::logging::{LogFormat, LoggingConfig};

/// Environment variable selecting the environment preset
pub const ENV_VAR: &str = "KINDRED_ENV";
/// Environment variable overriding the log level
pub const LOG_LEVEL_VAR: &str = "KINDRED_LOG_LEVEL";
/// Environment variable overriding the log format
pub const LOG_FORMAT_VAR: &str = "KINDRED_LOG_FORMAT";

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                field: "environment".to_string(),
                value: s.to_string(),
                expected: "development, testing, or production".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    /// Check if environment is development
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Check if environment is testing
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }

    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Optional YAML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub environment: Option<String>,
    pub service_name: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_filter: Option<String>,
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::file_system(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub service_name: String,
    pub log: LoggingConfig,
    sources: HashMap<String, ConfigSource>,
}

impl AppConfig {
    /// Preset for an environment
    pub fn for_environment(environment: Environment) -> Self {
        let log = match environment {
            Environment::Development => LoggingConfig::development(),
            Environment::Testing => LoggingConfig::test(),
            Environment::Production => LoggingConfig::production(),
        };
        let default = ConfigSource::Default(environment.to_string());
        let sources = ["environment", "service_name", "log_level", "log_format"]
            .into_iter()
            .map(|field| (field.to_string(), default.clone()))
            .collect();
        Self {
            environment,
            service_name: "kindred".to_string(),
            log,
            sources,
        }
    }

    /// Create configuration for development
    pub fn development() -> Self {
        Self::for_environment(Environment::Development)
    }

    /// Create configuration for testing
    pub fn testing() -> Self {
        Self::for_environment(Environment::Testing)
    }

    /// Create configuration for production
    pub fn production() -> Self {
        Self::for_environment(Environment::Production)
    }

    /// Start layering configuration sources
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_log_level(&self.log.level)?;
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("service_name", &self.service_name, "a non-empty name"));
        }
        Ok(())
    }

    /// Where each field's value came from
    pub fn config_sources(&self) -> &HashMap<String, ConfigSource> {
        &self.sources
    }

    pub fn source_of(&self, field: &str) -> Option<&ConfigSource> {
        self.sources.get(field)
    }

    /// A level from the environment or an override replaces any file filter
    fn set_log_level(&mut self, level: &str, source: ConfigSource) -> Result<(), ConfigError> {
        self.log.level = validate_log_level(level)?;
        if !source.is_file() && !source.is_default() {
            self.log.env_filter = None;
            self.sources.remove("log_filter");
        }
        self.sources.insert("log_level".to_string(), source);
        Ok(())
    }

    fn set_log_format(&mut self, format: LogFormat, source: ConfigSource) {
        self.log.format = format;
        self.sources.insert("log_format".to_string(), source);
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Layers defaults, a YAML file, environment variables and explicit overrides
///
/// Later sources win: preset < file < environment variables < overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    file: Option<PathBuf>,
    environment: Option<Environment>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
}

impl ConfigBuilder {
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    pub fn load(self) -> Result<AppConfig, ConfigError> {
        let file = self.file.as_deref().map(ConfigFile::from_path).transpose()?;
        let file_source = || ConfigSource::File(self.file.as_deref().map(|p| p.display().to_string()).unwrap_or_default());

        let (environment, env_source) = match (self.environment, env::var(ENV_VAR).ok()) {
            (Some(environment), _) => (environment, ConfigSource::Programmatic),
            (None, Some(value)) => (value.parse()?, ConfigSource::EnvVar(ENV_VAR.to_string())),
            (None, None) => match file.as_ref().and_then(|f| f.environment.as_deref()) {
                Some(value) => (value.parse()?, file_source()),
                None => (Environment::Development, ConfigSource::Default("development".to_string())),
            },
        };

        let mut config = AppConfig::for_environment(environment);
        config.sources.insert("environment".to_string(), env_source);

        if let Some(file) = file {
            if let Some(name) = file.service_name {
                config.service_name = name;
                config.sources.insert("service_name".to_string(), file_source());
            }
            if let Some(level) = file.log_level.as_deref() {
                config.set_log_level(level, file_source())?;
            }
            if let Some(format) = file.log_format.as_deref() {
                config.set_log_format(format.parse()?, file_source());
            }
            if let Some(filter) = file.log_filter {
                config.log.env_filter = Some(filter);
                config.sources.insert("log_filter".to_string(), file_source());
            }
        }

        if let Ok(level) = env::var(LOG_LEVEL_VAR) {
            config.set_log_level(&level, ConfigSource::EnvVar(LOG_LEVEL_VAR.to_string()))?;
        }
        if let Ok(format) = env::var(LOG_FORMAT_VAR) {
            config.set_log_format(format.parse()?, ConfigSource::EnvVar(LOG_FORMAT_VAR.to_string()));
        }

        if let Some(level) = self.log_level.as_deref() {
            config.set_log_level(level, ConfigSource::Programmatic)?;
        }
        if let Some(format) = self.log_format {
            config.set_log_format(format, ConfigSource::Programmatic);
        }

        config.validate()?;
        Ok(config)
    }
}
