//! # kindred-core: Process foundation for kindred tools
//!
//! Configuration layering, scoped structured logging, lifecycle tracking and
//! the runner that ties them together around an application body.

pub mod foundation;
pub mod errors;
pub mod config;
pub mod logging;
pub mod runner;

pub use foundation::{LifecycleManager, LifecycleState};
pub use errors::{CoreError, CoreResult};
pub use config::{AppConfig, ConfigBuilder, ConfigError, ConfigSource, Environment};
pub use logging::{LogFormat, LoggingConfig, LoggingContext};
pub use runner::{RunContext, Runner};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get framework version
pub fn version() -> &'static str {
    VERSION
}
