//! # Function-backed service (`ServiceFn`)
//!
//! [`ServiceFn`] wraps a closure `F: Fn(CancellationToken) -> Fut` as a full
//! [`Service`] unit. The closure receives a token that is cancelled by
//! `graceful_stop`, so the service side of the contract (idempotent,
//! concurrent-safe stop) comes for free.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use rungroup::{RunError, ServiceFn, Unit};
//!
//! let svc = ServiceFn::arc("worker", |stop: CancellationToken| async move {
//!     stop.cancelled().await;
//!     Ok::<_, RunError>(())
//! });
//!
//! assert_eq!(svc.name(), "worker");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RunError;

use super::unit::{Service, Unit};

/// Closure-backed [`Service`] implementation.
pub struct ServiceFn<F> {
    name: Cow<'static, str>,
    f: F,
    stop: CancellationToken,
}

impl<F> ServiceFn<F> {
    /// Creates a new function-backed service.
    ///
    /// Prefer [`ServiceFn::arc`] when registering with a group.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            stop: CancellationToken::new(),
        }
    }

    /// Creates the service and returns it as a shared handle, ready for
    /// [`Group::register`](crate::Group::register).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> Unit for ServiceFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RunError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

#[async_trait]
impl<F, Fut> Service for ServiceFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RunError>> + Send + 'static,
{
    async fn serve(&self) -> Result<(), RunError> {
        (self.f)(self.stop.clone()).await
    }

    async fn graceful_stop(&self) {
        self.stop.cancel();
    }
}
