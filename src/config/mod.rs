//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (*_SERVICE_URL, APP_ENV, ...)
//!     → validation.rs (scheme coercion, semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → passed into HttpServer at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the router never reads process state per request
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CorsConfig, Environment, LimitsConfig, ListenerConfig, ObservabilityConfig, RouterConfig,
    ServicesConfig, TimeoutConfig,
};
