//! # Health check service.
//!
//! [`HealthService`] is a Service + Config + PreRunner + Checker in one unit.
//! The group registers it implicitly at the start of the config phase (unless
//! disabled), so it rides the same lifecycle as everything else: it
//! contributes `--health-address` / `--health-endpoint` flags, resets its
//! checker map during pre-run, and serves the endpoint until stopped.
//!
//! Just before the serve stage the group offers every registered unit to
//! [`HealthService::register_unit`]; units exposing the
//! [`Checker`](crate::Checker) capability are retained, keyed by name, and
//! polled on every request.
//!
//! ## Rules
//! - Aggregate `AllUp` answers HTTP 200; `Partial` and `AllDown` answer 503.
//! - A body serialization failure answers 500 with a fixed, structurally
//!   valid JSON literal.
//! - The service's own status is `Initializing` before serve, `Running` once
//!   the listener is up, `ShuttingDown` from the moment `graceful_stop` runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode as HttpStatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{MultiError, RunError};
use crate::flags::{FlagSet, Var};
use crate::units::{Checker, Config, PreRunner, Service, Unit, UnitRef};

use super::status::{ServiceStatus, ServiceStatusCode, Status, StatusCode, MARSHAL_ERR_BODY};

const ADDRESS_FLAG: &str = "health-address";
const ENDPOINT_FLAG: &str = "health-endpoint";
const DEFAULT_ADDRESS: &str = ":9082";
const DEFAULT_ENDPOINT: &str = "/health";

/// HTTP health status aggregator over the units of a group.
pub struct HealthService {
    address: Var<String>,
    endpoint: Var<String>,
    listener: Mutex<Option<TcpListener>>,
    stop: CancellationToken,
    core: Arc<Core>,
}

/// Shared with the axum handler.
struct Core {
    checkers: Mutex<HashMap<String, UnitRef>>,
    status: RwLock<ServiceStatusCode>,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            address: Var::new(String::new()),
            endpoint: Var::new(String::new()),
            listener: Mutex::new(None),
            stop: CancellationToken::new(),
            core: Arc::new(Core {
                checkers: Mutex::new(HashMap::new()),
                status: RwLock::new(ServiceStatusCode::Initializing),
            }),
        }
    }

    /// Serves on a pre-bound listener instead of binding
    /// `--health-address`. Useful for tests and callers owning the socket.
    pub fn with_listener(self, listener: TcpListener) -> Self {
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
        self
    }

    /// Retains the unit when it exposes the checker capability; anything
    /// else is ignored silently.
    pub(crate) fn register_unit(&self, unit: &UnitRef) {
        if unit.as_checker().is_some() {
            debug!(unit = %unit.name(), "health checker registered");
            self.core
                .checkers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(unit.name().to_string(), Arc::clone(unit));
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for HealthService {
    fn name(&self) -> &str {
        "health"
    }

    fn as_config(&self) -> Option<&dyn Config> {
        Some(self)
    }

    fn as_pre_runner(&self) -> Option<&dyn PreRunner> {
        Some(self)
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }

    fn as_checker(&self) -> Option<&dyn Checker> {
        Some(self)
    }
}

impl Config for HealthService {
    fn flag_set(&self) -> Option<FlagSet> {
        let mut set = FlagSet::new("Health check service");
        set.string_var(
            &self.address,
            ADDRESS_FLAG,
            None,
            DEFAULT_ADDRESS,
            r#"address to host the health check service on; a bare port such as ":9082" works"#,
        );
        set.string_var(
            &self.endpoint,
            ENDPOINT_FLAG,
            None,
            DEFAULT_ENDPOINT,
            r#"HTTP path to serve health checks on, e.g. "/health""#,
        );
        Some(set)
    }

    fn validate(&self) -> Result<(), RunError> {
        let mut errors = MultiError::new();
        if self.address.get().is_empty() {
            errors.push(RunError::other(format!("--{ADDRESS_FLAG} flag is required")));
        }
        if self.endpoint.get().is_empty() {
            errors.push(RunError::other(format!(
                "--{ENDPOINT_FLAG} flag is required"
            )));
        }
        errors.into_result()
    }
}

#[async_trait]
impl PreRunner for HealthService {
    async fn pre_run(&self) -> Result<(), RunError> {
        self.core.set_status(ServiceStatusCode::Initializing);
        self.core
            .checkers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }
}

#[async_trait]
impl Service for HealthService {
    async fn serve(&self) -> Result<(), RunError> {
        let address = self.address.get();
        let endpoint = route_path(&self.endpoint.get());

        let injected = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
        let listener = match injected {
            Some(listener) => listener,
            None => TcpListener::bind(bind_address(&address))
                .await
                .map_err(|e| {
                    RunError::other(format!(
                        "unable to start health check service on {address}{endpoint}: {e}"
                    ))
                })?,
        };

        {
            let checkers = self.core.checkers.lock().unwrap_or_else(|e| e.into_inner());
            debug!(checkers = checkers.len(), "health checkers registered");
        }

        let app = Router::new()
            .route(&endpoint, get(handle))
            .with_state(Arc::clone(&self.core));

        info!(%address, %endpoint, "starting health check service");
        self.core.set_status(ServiceStatusCode::Running);

        let stop = self.stop.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await
            .map_err(RunError::other)
    }

    async fn graceful_stop(&self) {
        debug!("shutting down health check service");
        self.core.set_status(ServiceStatusCode::ShuttingDown);
        self.stop.cancel();
    }
}

impl Checker for HealthService {
    fn health(&self) -> ServiceStatus {
        ServiceStatus {
            code: self.core.get_status(),
        }
    }
}

impl Core {
    fn set_status(&self, code: ServiceStatusCode) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = code;
    }

    fn get_status(&self) -> ServiceStatusCode {
        self.status.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Polls every retained checker and aggregates.
    fn check_services(&self) -> Status {
        let checkers = self.checkers.lock().unwrap_or_else(|e| e.into_inner());
        let mut services = HashMap::with_capacity(checkers.len());
        for (name, unit) in checkers.iter() {
            if let Some(checker) = unit.as_checker() {
                services.insert(name.clone(), checker.health());
            }
        }
        Status::aggregate(services)
    }
}

async fn handle(State(core): State<Arc<Core>>) -> Response {
    let status = core.check_services();
    let http_code = match status.code {
        StatusCode::AllDown | StatusCode::Partial => HttpStatusCode::SERVICE_UNAVAILABLE,
        _ => HttpStatusCode::OK,
    };
    match serde_json::to_vec(&status) {
        Ok(body) => (http_code, [(CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => {
            error!("error marshalling status: {err}");
            (
                HttpStatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "application/json")],
                MARSHAL_ERR_BODY,
            )
                .into_response()
        }
    }
}

// ":9082" means every interface, pflag-style; the std listener wants a host
fn bind_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_string()
    }
}

fn route_path(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}
