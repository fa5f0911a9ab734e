//! Application runner - One scoped block per process run
//!
//! The runner opens a [`LoggingContext`], walks the lifecycle from `Created`
//! to `Stopped` (or `Failed`) around the application body, and reports the
//! body's failure both through `tracing` and as [`CoreError::Application`].
//! The logging context is released on every exit path when it goes out of
//! scope.

use std::error::Error;
use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::instrument::WithSubscriber;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::{CoreError, CoreResult};
use crate::foundation::{LifecycleManager, LifecycleState};
use crate::logging::LoggingContext;

/// What the application body gets to see about its run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: AppConfig,
}

/// Runs an application body inside scoped logging and lifecycle tracking
#[derive(Debug)]
pub struct Runner {
    config: AppConfig,
    lifecycle: LifecycleManager,
}

impl Runner {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            lifecycle: LifecycleManager::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> CoreResult<LifecycleState> {
        self.lifecycle.state()
    }

    /// Run a synchronous body with the subscriber installed on this thread
    pub fn run<F, T, E>(&self, body: F) -> CoreResult<T>
    where
        F: FnOnce(&RunContext) -> Result<T, E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let _logging = LoggingContext::new(&self.config.log)?.install();
        let context = self.start()?;
        let result = body(&context);
        self.finish(&context, result)
    }

    /// Run an async body with the subscriber attached to its future
    pub async fn run_async<F, Fut, T, E>(&self, body: F) -> CoreResult<T>
    where
        F: FnOnce(RunContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let logging = LoggingContext::new(&self.config.log)?;
        let dispatch = logging.dispatch().clone();
        async {
            let context = self.start()?;
            let result = body(context.clone()).await;
            self.finish(&context, result)
        }
        .with_subscriber(dispatch)
        .await
    }

    fn start(&self) -> CoreResult<RunContext> {
        self.lifecycle.transition(LifecycleState::Initializing)?;
        let context = RunContext {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config: self.config.clone(),
        };
        tracing::info!(
            target: "kindred::runner",
            run_id = %context.run_id,
            "starting {} ({})",
            self.config.service_name,
            self.config.environment
        );
        self.lifecycle.transition(LifecycleState::Running)?;
        Ok(context)
    }

    fn finish<T, E>(&self, context: &RunContext, result: Result<T, E>) -> CoreResult<T>
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let elapsed = Utc::now() - context.started_at;
        match result {
            Ok(value) => {
                self.lifecycle.transition(LifecycleState::Stopping)?;
                self.lifecycle.transition(LifecycleState::Stopped)?;
                tracing::info!(
                    target: "kindred::runner",
                    run_id = %context.run_id,
                    "stopped {} after {}ms",
                    self.config.service_name,
                    elapsed.num_milliseconds()
                );
                Ok(value)
            }
            Err(err) => {
                let err = CoreError::application(err);
                self.lifecycle.transition(LifecycleState::Failed)?;
                tracing::error!(
                    target: "kindred::runner",
                    run_id = %context.run_id,
                    "{} failed after {}ms: {}",
                    self.config.service_name,
                    elapsed.num_milliseconds(),
                    err
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_run() {
        let runner = Runner::new(AppConfig::testing());
        let value = runner.run(|ctx| Ok::<_, CoreError>(ctx.config.service_name.clone())).unwrap();
        assert_eq!(value, "kindred");
        assert_eq!(runner.state().unwrap(), LifecycleState::Stopped);
    }

    #[test]
    fn test_failed_body_is_reported() {
        let runner = Runner::new(AppConfig::testing());
        let err = runner
            .run(|_| Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
            .unwrap_err();
        assert!(err.is_application());
        assert!(err.to_string().contains("disk gone"));
        assert_eq!(runner.state().unwrap(), LifecycleState::Failed);
    }

    #[test]
    fn test_runner_runs_once() {
        let runner = Runner::new(AppConfig::testing());
        runner.run(|_| Ok::<_, CoreError>(())).unwrap();
        assert!(matches!(
            runner.run(|_| Ok::<_, CoreError>(())),
            Err(CoreError::Lifecycle { .. })
        ));
    }

    #[tokio::test]
    async fn test_async_run() {
        let runner = Runner::new(AppConfig::testing());
        let id = runner
            .run_async(|ctx| async move { Ok::<_, CoreError>(ctx.run_id) })
            .await
            .unwrap();
        assert!(!id.is_nil());
        assert_eq!(runner.state().unwrap(), LifecycleState::Stopped);
    }
}
