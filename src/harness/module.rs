use super::super::library::{BoxedError, EmptyResult};
use super::{DeathReason, Heart};
use crate::constants::{DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_STARTUP_TIMEOUT};
use async_trait::async_trait;
use std::any::type_name;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Executable module
#[async_trait]
pub trait Module {
    /// Executed before running the core loop, usually to wire up connections
    async fn pre_startup(&mut self) -> EmptyResult {
        Ok(())
    }

    /// Core run loop of the module
    ///
    /// When the function returns `Some(_)` the death of the returned [`Heart`] is awaited before calling the shutdown hook.
    /// Useful for situations where you dispatch background tasks in the run loop but want to hand-off the program lifecycle management.
    ///
    /// Returning `None` results in the program entering the shutdown sequence right away.
    async fn run(&mut self) -> Result<Option<Heart>, BoxedError>;

    /// Winds down everything started by the module, bounded by the shutdown timeout of the [`ModuleRunner`]
    async fn shutdown(&mut self) {}

    /// Shutdown hook executed after the shutdown sequence has completed or timed out
    #[instrument(skip(self))]
    async fn post_shutdown(&mut self, termination_reason: &ModuleTerminationReason) {
        match termination_reason {
            ModuleTerminationReason::HeartDied(_) | ModuleTerminationReason::ExitedNormally => {
                info!("Module exited normally")
            }
            _ => error!("Module terminated with an error"),
        }
    }
}

/// Reason why a module has terminated
#[derive(Error, Debug)]
pub enum ModuleTerminationReason {
    /// Startup routine threw an error
    #[error("startup routine threw an error")]
    StartupFailed(#[source] BoxedError),
    /// Core run loop threw an error
    #[error("error during operation")]
    OperationalError(#[source] BoxedError),
    /// [`Heart`] provided by module died
    #[error("heart provided by module died: {0}")]
    HeartDied(DeathReason),
    /// Run loop exited cleanly
    #[error("run loop exited cleanly")]
    ExitedNormally,
    /// Timeout during startup
    #[error("timeout during startup")]
    Timeout,
}

impl ModuleTerminationReason {
    /// Whether the module failed to get up and running and the process should exit with an error
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ModuleTerminationReason::StartupFailed(_)
                | ModuleTerminationReason::OperationalError(_)
                | ModuleTerminationReason::Timeout
        )
    }
}

/// Runner for [`Module`] implementations
pub struct ModuleRunner {
    startup_timeout: Duration,
    shutdown_timeout: Duration,
}

impl ModuleRunner {
    /// Creates a new instance with the given shutdown timeout
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            shutdown_timeout,
            ..Default::default()
        }
    }
}

impl Default for ModuleRunner {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ModuleRunner {
    /// Executes a [`Module`] until it exits by calling the corresponding lifecycle functions in order
    /// and returns the reason why it terminated.
    ///
    /// The shutdown sequence runs whenever the startup has been attempted, so that partially
    /// wired modules release their connections. If it does not complete within the shutdown
    /// timeout it is abandoned.
    #[instrument(skip(self, module), fields(module_name = type_name::<M>()))]
    pub async fn run<M: Module + Send>(&self, mut module: M) -> ModuleTerminationReason {
        info!("Commencing module startup sequence");
        let startup = timeout(self.startup_timeout, module.pre_startup()).await;

        let termination_reason = match startup {
            Ok(Ok(_)) => self.run_loop(&mut module).await,
            Ok(Err(error)) => {
                error!(?error, "Module startup sequence encountered an error");
                ModuleTerminationReason::StartupFailed(error)
            }
            Err(_) => {
                error!("Module startup sequence timed out");
                ModuleTerminationReason::Timeout
            }
        };

        info!("Commencing module shutdown sequence");
        if timeout(self.shutdown_timeout, module.shutdown()).await.is_err() {
            error!(
                timeout = ?self.shutdown_timeout,
                "Module shutdown sequence timed out, forcing exit"
            );
        }

        module.post_shutdown(&termination_reason).await;

        termination_reason
    }

    async fn run_loop<M: Module + Send>(&self, module: &mut M) -> ModuleTerminationReason {
        info!("Executing module run procedure");

        match module.run().await {
            Ok(None) => {
                debug!("Module run procedure completed successfully");
                ModuleTerminationReason::ExitedNormally
            }
            Ok(Some(mut heart)) => {
                debug!("Module run procedure completed successfully, entering run loop");
                let death_reason = heart.death().await;
                info!(?death_reason, "Heart provided by run procedure died");
                ModuleTerminationReason::HeartDied(death_reason)
            }
            Err(error) => {
                error!(?error, "Module run procedure encountered an error");
                ModuleTerminationReason::OperationalError(error)
            }
        }
    }
}
