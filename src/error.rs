//! # Error types used by the group runtime and its units.
//!
//! [`RunError`] covers every way a run can end: configuration failures,
//! aborted pre-run work, service errors, and the two *sentinels* that mean
//! "stop, but successfully":
//!
//! - [`RunError::BailEarly`]: the config phase already did its job
//!   (`--help`, `--version`, unit inventory); translated to success by
//!   [`Group::run`](crate::Group::run).
//! - [`RunError::RequestedShutdown`]: a service chose to stop; peers are
//!   torn down and the run reports success.
//!
//! Validation errors are the one place where errors accumulate instead of
//! short-circuiting: every `Config` unit gets to report, and the result is a
//! single [`MultiError`] rendered as a readable list.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Boxed error type carried for unit-defined failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced by the group lifecycle.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RunError {
    /// A service requested cooperative shutdown from its `serve`.
    ///
    /// Not a failure: the group stops every peer and returns success.
    #[error("shutdown requested")]
    RequestedShutdown,

    /// The config phase handled a request that ends the process early
    /// (`--help`, `--version`, `--show-rungroup-units`).
    #[error("early exit request")]
    BailEarly,

    /// The command line could not be parsed against the merged flag set.
    #[error("parsing flags: {reason}")]
    Parse {
        /// Parser error text, surfaced verbatim.
        reason: String,
    },

    /// One or more `Config` units rejected their parsed values.
    #[error("{0}")]
    Validation(MultiError),

    /// A pre-runner failed, aborting the run before any service started.
    #[error("pre-run {unit}: {source}")]
    PreRun {
        /// Name of the failing unit.
        unit: String,
        source: Box<RunError>,
    },

    /// The first service to return did so without an error.
    ///
    /// Services are contractually blocking, so a clean return is reported as
    /// a failure unless shutdown was requested.
    #[error("run terminated without explicit error condition")]
    UnexpectedCleanExit,

    /// A unit-defined failure.
    #[error("{0}")]
    Other(BoxError),
}

impl RunError {
    /// Wraps an arbitrary error (or message) as a unit failure.
    pub fn other(err: impl Into<BoxError>) -> Self {
        RunError::Other(err.into())
    }

    /// True when this error is, or wraps, [`RunError::RequestedShutdown`].
    pub fn is_requested_shutdown(&self) -> bool {
        match self {
            RunError::RequestedShutdown => true,
            RunError::Other(err) => {
                let mut cause: Option<&(dyn StdError + 'static)> = Some(&**err);
                while let Some(current) = cause {
                    if matches!(
                        current.downcast_ref::<RunError>(),
                        Some(RunError::RequestedShutdown)
                    ) {
                        return true;
                    }
                    cause = current.source();
                }
                false
            }
            _ => false,
        }
    }

    pub(crate) fn is_bail_early(&self) -> bool {
        matches!(self, RunError::BailEarly)
    }
}

impl From<MultiError> for RunError {
    fn from(errors: MultiError) -> Self {
        RunError::Validation(errors)
    }
}

/// Accumulator for validation errors, kept in registration order.
///
/// Renders as a bullet list so a run that fails three validations reports all
/// three at once instead of the first only.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<RunError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error, flattening nested accumulations so rendering stays a
    /// single flat list.
    pub fn push(&mut self, err: RunError) {
        match err {
            RunError::Validation(nested) => self.errors.extend(nested.errors),
            other => self.errors.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[RunError] {
        &self.errors
    }

    /// `Ok` when empty, otherwise the accumulation as a [`RunError`].
    pub fn into_result(self) -> Result<(), RunError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(RunError::Validation(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors occurred"),
            1 => write!(f, "1 error occurred:\n\t* {}", self.errors[0]),
            n => {
                write!(f, "{n} errors occurred:")?;
                for err in &self.errors {
                    write!(f, "\n\t* {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl StdError for MultiError {}
