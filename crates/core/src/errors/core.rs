use thiserror::Error;

use crate::config::ConfigError;
use crate::foundation::LifecycleState;

/// Core error type for kindred processes
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {message}")]
    Logging { message: String },

    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    Lifecycle { from: LifecycleState, to: LifecycleState },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Application error: {source}")]
    Application {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CoreError {
    /// Wrap an error returned by the application body
    pub fn application(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Application {
            source: source.into(),
        }
    }

    pub fn lock_error(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if the error came from the application body
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application { .. })
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
