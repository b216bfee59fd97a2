//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::ServiceId;

/// Root configuration for the service router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Base URLs of the five backend services.
    pub services: ServicesConfig,

    /// Deployment environment; gates diagnostic detail in proxy errors.
    pub environment: Environment,

    /// Upstream client timeouts.
    pub timeouts: TimeoutConfig,

    /// Request body limits.
    pub limits: LimitsConfig,

    /// CORS policy applied to every response.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RouterConfig {
    /// Whether proxy errors may carry diagnostic detail.
    pub fn expose_error_details(&self) -> bool {
        self.environment != Environment::Production
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// One base URL per logical backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// General API service.
    pub general: String,

    /// Group and messaging service.
    pub group: String,

    /// Notification service.
    pub notification: String,

    /// File and media service.
    pub file: String,

    /// Presence service.
    pub presence: String,
}

impl ServicesConfig {
    /// Configured base URL for a service, exactly as written.
    pub fn base_url(&self, service: ServiceId) -> &str {
        match service {
            ServiceId::General => &self.general,
            ServiceId::Group => &self.group,
            ServiceId::Notification => &self.notification,
            ServiceId::File => &self.file,
            ServiceId::Presence => &self.presence,
        }
    }

    pub(crate) fn base_url_mut(&mut self, service: ServiceId) -> &mut String {
        match service {
            ServiceId::General => &mut self.general,
            ServiceId::Group => &mut self.group,
            ServiceId::Notification => &mut self.notification,
            ServiceId::File => &mut self.file,
            ServiceId::Presence => &mut self.presence,
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            general: "http://localhost:8000".to_string(),
            group: "http://localhost:8001".to_string(),
            notification: "http://localhost:8002".to_string(),
            file: "http://localhost:8003".to_string(),
            presence: "http://localhost:8004".to_string(),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "test" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Timeouts applied by the upstream HTTP clients.
///
/// The router itself never enforces a request deadline; these are
/// connection-level settings of the clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            pool_idle_secs: 90,
        }
    }
}

/// Body size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a buffered JSON request body.
    pub max_json_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_json_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin, without credentials.
    pub allowed_origins: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
