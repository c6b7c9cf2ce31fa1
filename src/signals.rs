//! # OS signal handling as a group service.
//!
//! [`SignalHandler`] is a [`Service`](crate::Service) unit that watches
//! process signals and turns them into group lifecycle events:
//!
//! - **SIGINT / SIGQUIT / SIGTERM**: `serve` returns
//!   [`RunError::RequestedShutdown`], so the whole group tears down and the
//!   run reports success.
//! - **SIGHUP**: invokes the optional refresh callback. A callback error
//!   terminates the handler, which in a group environment stops everything.
//!
//! On non-Unix platforms only Ctrl-C is watched.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rungroup::{Group, SignalHandler};
//!
//! # async fn example() -> Result<(), rungroup::RunError> {
//! let group = Group::default();
//! group.register(Arc::new(SignalHandler::new()));
//! group.run(std::env::args()).await
//! # }
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::RunError;
use crate::units::{Service, Unit};

type RefreshFn = Box<dyn Fn() -> Result<(), RunError> + Send + Sync>;

/// Unix signal handler unit.
pub struct SignalHandler {
    refresh: Option<RefreshFn>,
    stop: CancellationToken,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            refresh: None,
            stop: CancellationToken::new(),
        }
    }

    /// Callback invoked when SIGHUP is received. An error stops the handler
    /// and, through it, the group.
    pub fn with_refresh(
        mut self,
        callback: impl Fn() -> Result<(), RunError> + Send + Sync + 'static,
    ) -> Self {
        self.refresh = Some(Box::new(callback));
        self
    }

    #[cfg(unix)]
    async fn wait(&self) -> Result<(), RunError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sighup = signal(SignalKind::hangup()).map_err(RunError::other)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(RunError::other)?;
        let mut sigquit = signal(SignalKind::quit()).map_err(RunError::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(RunError::other)?;

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    if let Some(refresh) = &self.refresh {
                        refresh()?;
                    }
                }
                _ = sigint.recv() => {
                    info!(signal = "SIGINT", "termination signal received");
                    return Err(RunError::RequestedShutdown);
                }
                _ = sigquit.recv() => {
                    info!(signal = "SIGQUIT", "termination signal received");
                    return Err(RunError::RequestedShutdown);
                }
                _ = sigterm.recv() => {
                    info!(signal = "SIGTERM", "termination signal received");
                    return Err(RunError::RequestedShutdown);
                }
                _ = self.stop.cancelled() => return Ok(()),
            }
        }
    }

    #[cfg(not(unix))]
    async fn wait(&self) -> Result<(), RunError> {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(RunError::other)?;
                info!(signal = "ctrl-c", "termination signal received");
                Err(RunError::RequestedShutdown)
            }
            _ = self.stop.cancelled() => Ok(()),
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for SignalHandler {
    fn name(&self) -> &str {
        "signal"
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

#[async_trait]
impl Service for SignalHandler {
    async fn serve(&self) -> Result<(), RunError> {
        self.wait().await
    }

    async fn graceful_stop(&self) {
        self.stop.cancel();
    }
}
