//! # Supervisor: the actor group with deterministic teardown.
//!
//! Runs N `(execute, interrupt)` pairs concurrently and tears everything down
//! as soon as the *first* actor returns, error or not.
//!
//! ```text
//! Actor[] ──► Supervisor::run()
//!                  │
//!                  ├──► spawn every execute into a JoinSet
//!                  │         └──► each sends its result into a capacity-N channel
//!                  │
//!                  ├──► wait for the FIRST result
//!                  ├──► invoke every interrupt exactly once (cause = first result)
//!                  ├──► drain the JoinSet until every actor has returned
//!                  └──► return the first result
//! ```
//!
//! ## Rules
//! - Empty actor list returns success immediately.
//! - Exactly one interrupt call per actor; invocation order is unspecified.
//! - `run` does not return before every actor has; no orphan tasks.
//! - A clean first exit still interrupts the peers and is propagated; the
//!   group layer decides what a clean exit means.
//! - There is no built-in cancellation channel: interruption is delivered
//!   through each service's `graceful_stop`, which must make `serve` return.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::RunError;

/// One-shot execute future of an actor.
pub(crate) type ExecuteFuture = Pin<Box<dyn Future<Output = Result<(), RunError>> + Send + 'static>>;

/// Interrupt hook of an actor; receives the first actor's failure, if any.
pub(crate) type InterruptFn =
    Box<dyn FnOnce(Option<&RunError>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> + Send>;

pub(crate) struct Actor {
    pub(crate) execute: ExecuteFuture,
    pub(crate) interrupt: InterruptFn,
}

/// Collects actors before the serve stage; consumed by [`Supervisor::run`].
/// No mutation happens once `run` starts.
pub(crate) struct Supervisor {
    actors: Vec<Actor>,
}

impl Supervisor {
    pub(crate) fn new() -> Self {
        Self { actors: Vec::new() }
    }

    pub(crate) fn add(&mut self, actor: Actor) {
        self.actors.push(actor);
    }

    /// Runs every actor to completion, first-to-return wins.
    pub(crate) async fn run(self) -> Result<(), RunError> {
        if self.actors.is_empty() {
            return Ok(());
        }

        let capacity = self.actors.len();
        let (tx, mut rx) = mpsc::channel::<Result<(), RunError>>(capacity);
        let mut interrupts = Vec::with_capacity(capacity);
        let mut set = JoinSet::new();

        for Actor { execute, interrupt } in self.actors {
            interrupts.push(interrupt);
            let tx = tx.clone();
            // channel capacity equals actor count, so the send never blocks
            set.spawn(async move {
                let _ = tx.send(execute.await).await;
            });
        }
        drop(tx);

        // a panicked actor never sends; if every actor panics the channel
        // closes and the run is treated as a clean exit
        let first = rx.recv().await.unwrap_or(Ok(()));

        let cause = first.as_ref().err();
        for interrupt in interrupts {
            interrupt(cause).await;
        }

        while set.join_next().await.is_some() {}
        first
    }
}
