//! # Unit model: the base contract and the optional phase capabilities.
//!
//! A *unit* is anything registered with a [`Group`](crate::Group). The base
//! contract is a stable [`name`](Unit::name); everything else is opt-in. A
//! unit joins a lifecycle phase by overriding the matching `as_*` accessor to
//! return `Some(self)`:
//!
//! | Accessor | Capability | Phase |
//! |---|---|---|
//! | [`Unit::as_initializer`] | [`Initializer`] | idempotent setup before config |
//! | [`Unit::as_namer`]       | [`Namer`]       | receives the resolved group name |
//! | [`Unit::as_config`]      | [`Config`]      | contributes flags, validates values |
//! | [`Unit::as_pre_runner`]  | [`PreRunner`]   | serial startup work |
//! | [`Unit::as_service`]     | [`Service`]     | blocking serve + graceful stop |
//! | [`Unit::as_checker`]     | [`Checker`]     | reports health status |
//!
//! ## Rules
//! - Identity is object identity (`Arc::ptr_eq`), never the name; two units
//!   may share a name and remain distinct registrations.
//! - A unit may satisfy any subset of capabilities; it is slotted into every
//!   phase list whose accessor returns `Some`.
//! - A bare unit (no capability) registers without effect.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RunError;
use crate::flags::FlagSet;
use crate::health::ServiceStatus;

/// Shared handle to a registered unit.
pub type UnitRef = Arc<dyn Unit>;

/// Base contract for everything a [`Group`](crate::Group) manages.
pub trait Unit: Send + Sync + 'static {
    /// Short identifier used for diagnostics and as the key under which the
    /// unit's health status is reported.
    fn name(&self) -> &str;

    /// Initialize-phase capability, if any.
    fn as_initializer(&self) -> Option<&dyn Initializer> {
        None
    }

    /// Name-notification capability, if any.
    fn as_namer(&self) -> Option<&dyn Namer> {
        None
    }

    /// Config-phase capability, if any.
    fn as_config(&self) -> Option<&dyn Config> {
        None
    }

    /// Pre-run capability, if any.
    fn as_pre_runner(&self) -> Option<&dyn PreRunner> {
        None
    }

    /// Serve-phase capability, if any.
    fn as_service(&self) -> Option<&dyn Service> {
        None
    }

    /// Health-reporting capability, if any.
    fn as_checker(&self) -> Option<&dyn Checker> {
        None
    }
}

/// Setup hook invoked once before the config phase touches the unit.
pub trait Initializer: Unit {
    /// Must be safe to call more than once.
    fn initialize(&self);
}

/// Receives the group's resolved display name before config runs.
pub trait Namer: Unit {
    fn group_name(&self, name: &str);
}

/// Configuration surface of a unit.
pub trait Config: Unit {
    /// Returns the unit's flag set, or `None` when it has no flags.
    fn flag_set(&self) -> Option<FlagSet>;

    /// Validates the parsed values. Called after the full command line parse;
    /// errors from all config units are accumulated before the run aborts.
    fn validate(&self) -> Result<(), RunError>;
}

/// Synchronous startup work executed in registration order before any
/// service starts. The first failure aborts the group.
#[async_trait]
pub trait PreRunner: Unit {
    async fn pre_run(&self) -> Result<(), RunError>;
}

/// A supervised actor.
#[async_trait]
pub trait Service: Unit {
    /// Starts the service and blocks for its lifetime. Returning, with or
    /// without an error, triggers teardown of every peer.
    ///
    /// Recoverable conditions must be handled inside the service itself; a
    /// service wanting the whole group to stop cleanly returns
    /// [`RunError::RequestedShutdown`].
    async fn serve(&self) -> Result<(), RunError>;

    /// Makes `serve` return. Must be idempotent and safe to call
    /// concurrently with `serve`; a close-once token or channel is the
    /// canonical guard.
    async fn graceful_stop(&self);
}

/// Health-reporting capability, picked up by the
/// [`HealthService`](crate::HealthService) aggregator.
pub trait Checker: Unit {
    fn health(&self) -> ServiceStatus;
}
