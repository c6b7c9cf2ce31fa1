//! Health status aggregation: wire model and the HTTP aggregator unit.

mod service;
mod status;

pub use service::HealthService;
pub use status::{ServiceStatus, ServiceStatusCode, Status, StatusCode};
