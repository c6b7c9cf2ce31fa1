//! Builder for [`Group`] construction-time options.

use std::sync::Arc;

use crate::health::HealthService;

use super::group::{Group, Options};

/// Builds a [`Group`]. All options are frozen once `build` is called;
/// everything that changes afterwards goes through the group itself.
pub struct GroupBuilder {
    name: Option<String>,
    help_text: String,
    version: String,
    health: bool,
    health_service: Option<Arc<HealthService>>,
}

impl GroupBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: None,
            help_text: String::new(),
            version: String::new(),
            health: true,
            health_service: None,
        }
    }

    /// Display name of the group. Defaults to the binary name at runtime and
    /// can still be overridden by the reserved `--name` flag.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Additional context printed with `--help`. The token `{{.Name}}` is
    /// expanded with the raw first argv element.
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Raw build version string (`git describe --tags --long` plus branch),
    /// printed by the reserved `--version` flag. See [`crate::version`].
    pub fn version(mut self, raw: impl Into<String>) -> Self {
        self.version = raw.into();
        self
    }

    /// Disables the implicit health check service.
    pub fn disable_health(mut self) -> Self {
        self.health = false;
        self
    }

    /// Uses a pre-built health service instead of the implicit one, e.g. one
    /// carrying an already-bound listener.
    pub fn with_health_service(mut self, service: HealthService) -> Self {
        self.health = true;
        self.health_service = Some(Arc::new(service));
        self
    }

    pub fn build(self) -> Group {
        Group::with_options(Options {
            name: self.name,
            help_text: self.help_text,
            version: self.version,
            health: self.health,
            health_service: self.health_service,
        })
    }
}
