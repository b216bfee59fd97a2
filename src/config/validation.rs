//! Configuration validation.
//!
//! # Responsibilities
//! - Coerce service base URLs to carry a scheme
//! - Validate value ranges (bind address parses, URLs have a host)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RouterConfig, ServicesConfig};
use crate::routing::resolver::ensure_scheme;
use crate::routing::ServiceId;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid base URL for {service} service: '{url}'")]
    ServiceUrl { service: ServiceId, url: String },
}

/// Rewrite every service base URL through `ensure_scheme`.
pub fn normalize_services(services: &mut ServicesConfig) {
    for service in ServiceId::ALL {
        let slot = services.base_url_mut(service);
        let coerced = ensure_scheme(slot);
        if coerced != *slot {
            tracing::debug!(%service, from = %slot, to = %coerced, "Coerced service base URL");
            *slot = coerced;
        }
    }
}

/// Check a configuration, collecting every problem.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    for service in ServiceId::ALL {
        let raw = config.services.base_url(service);
        let valid = url::Url::parse(raw)
            .map(|u| u.host_str().is_some_and(|h| !h.is_empty()))
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::ServiceUrl {
                service,
                url: raw.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
