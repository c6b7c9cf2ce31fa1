//! # Helpers for testing group-enabled services.
//!
//! [`IrqService`] registers like any other service and gives the test a
//! handle to shut the whole group down: calling [`IrqService::close`] makes
//! its `serve` return the shutdown sentinel, which tears down every peer and
//! lets `run` report success.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RunError;
use crate::units::{Service, Unit};

/// Service unit whose only job is to end the group on demand.
pub struct IrqService {
    tx: Mutex<Option<mpsc::Sender<RunError>>>,
    rx: Mutex<Option<mpsc::Receiver<RunError>>>,
}

impl IrqService {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Requests shutdown of the owning group. Safe to call at any point,
    /// including before the group reached its serve stage.
    pub fn close(&self) {
        let sender = self.tx.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(sender) = sender {
            let _ = sender.try_send(RunError::RequestedShutdown);
        }
    }
}

impl Default for IrqService {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for IrqService {
    fn name(&self) -> &str {
        "irqsvc"
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

#[async_trait]
impl Service for IrqService {
    async fn serve(&self) -> Result<(), RunError> {
        let receiver = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(mut receiver) = receiver else {
            return Err(RunError::other("irq service served twice"));
        };
        match receiver.recv().await {
            Some(err) => Err(err),
            // channel closed by graceful_stop: clean return
            None => Ok(()),
        }
    }

    async fn graceful_stop(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}
