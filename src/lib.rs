//! # rungroup
//!
//! **rungroup** composes a process out of independently written *units* and
//! runs them through a deterministic, phased lifecycle: coordinated startup,
//! concurrent serving, and coordinated teardown on the first failure or
//! shutdown request.
//!
//! | Area | Description | Key types / traits |
//! |------|-------------|--------------------|
//! | **Units**       | Opt-in phase capabilities discovered at registration.   | [`Unit`], [`Service`], [`Config`], [`PreRunner`], [`Initializer`], [`Namer`] |
//! | **Flags**       | Named flag sets merged process-wide, first wins.        | [`FlagSet`], [`Var`] |
//! | **Group**       | The orchestrator: config → pre-run → serve pipeline.    | [`Group`], [`GroupBuilder`] |
//! | **Health**      | Auto-registered HTTP aggregator over unit checkers.     | [`HealthService`], [`Checker`], [`Status`] |
//! | **Signals**     | OS signals as cooperative shutdown requests.            | [`SignalHandler`] |
//! | **Errors**      | Sentinels and accumulation for the whole lifecycle.     | [`RunError`], [`MultiError`] |
//!
//! The serve stage follows the actor-group pattern: every service runs
//! concurrently, the first one to return (error or not) triggers a
//! `graceful_stop` of all peers, and the run reports the first result once
//! everyone has returned.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use rungroup::{Group, RunError, ServiceFn, SignalHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RunError> {
//!     let group = Group::builder()
//!         .name("pingd")
//!         .help_text("pingd keeps upstream connections warm.")
//!         .build();
//!
//!     let worker = ServiceFn::arc("worker", |stop: CancellationToken| async move {
//!         // serve until asked to stop
//!         stop.cancelled().await;
//!         Ok::<(), RunError>(())
//!     });
//!     group.register(worker);
//!
//!     // SIGINT/SIGTERM become a clean shutdown of the whole group
//!     group.register(Arc::new(SignalHandler::new()));
//!
//!     group.run(std::env::args()).await
//! }
//! ```

mod error;
mod flags;
mod group;
mod health;
mod units;

pub mod signals;
pub mod testkit;
pub mod version;

pub use error::{BoxError, MultiError, RunError};
pub use flags::{FlagSet, Var};
pub use group::{Group, GroupBuilder};
pub use health::{HealthService, ServiceStatus, ServiceStatusCode, Status, StatusCode};
pub use signals::SignalHandler;
pub use units::{
    Checker, Config, Initializer, Namer, PreRunner, Service, ServiceFn, Unit, UnitRef,
};
