use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("File system error: {message}")]
    FileSystemError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a file system error
    pub fn file_system(message: impl Into<String>) -> Self {
        Self::FileSystemError {
            message: message.into(),
        }
    }
}

/// Accepted log level names
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Check a log level name, normalizing it to lowercase
pub fn validate_log_level(level: &str) -> Result<String, ConfigError> {
    let normalized = level.trim().to_lowercase();
    if LOG_LEVELS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(ConfigError::invalid_value(
            "log_level",
            level,
            format!("one of: {}", LOG_LEVELS.join(", ")),
        ))
    }
}
