//! # Health status wire model.
//!
//! The aggregator reports one code per checker plus an aggregate code for the
//! whole process. Known codes serialize as their bare names; anything else a
//! checker reports is carried through as-is via the untagged `Other` variant,
//! so the JSON stays a plain string either way:
//!
//! ```json
//! {"code":"Partial","services":{"worker":{"code":"Running"}}}
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Fixed body returned with HTTP 500 when serializing the real status fails.
/// Structurally valid against [`Status`] so clients keep parsing.
pub(crate) const MARSHAL_ERR_BODY: &str =
    r#"{"code":"No Service Operational","services":{"health":{"code":"Error marshalling status"}}}"#;

/// Status of a single checker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatusCode {
    /// Before `serve` has started.
    Initializing,
    /// Up and serving.
    Running,
    /// From the moment `graceful_stop` is called.
    ShuttingDown,
    /// Any other code a checker reports, carried through as-is.
    #[serde(untagged)]
    Other(String),
}

/// Aggregate status over every registered checker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// Every checker reports [`ServiceStatusCode::Running`].
    AllUp,
    /// No checker does.
    AllDown,
    /// Some do.
    Partial,
    #[serde(untagged)]
    Other(String),
}

/// Per-checker status entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub code: ServiceStatusCode,
}

/// Full health report: aggregate code plus per-checker statuses keyed by
/// unit name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub services: HashMap<String, ServiceStatus>,
}

impl Status {
    /// Computes the aggregate code from per-checker statuses.
    pub fn aggregate(services: HashMap<String, ServiceStatus>) -> Self {
        let running = services
            .values()
            .filter(|s| s.code == ServiceStatusCode::Running)
            .count();
        let code = if running == services.len() {
            StatusCode::AllUp
        } else if running == 0 {
            StatusCode::AllDown
        } else {
            StatusCode::Partial
        };
        Status { code, services }
    }
}
