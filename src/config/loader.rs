//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::config::validation::{normalize_services, validate_config, ValidationError};
use crate::routing::ServiceId;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variable holding each service's base URL.
pub fn service_env_var(service: ServiceId) -> &'static str {
    match service {
        ServiceId::General => "GENERAL_SERVICE_URL",
        ServiceId::Group => "GROUP_SERVICE_URL",
        ServiceId::Notification => "NOTIFICATION_SERVICE_URL",
        ServiceId::File => "FILE_SERVICE_URL",
        ServiceId::Presence => "PRESENCE_SERVICE_URL",
    }
}

/// Load configuration: TOML file (optional), then process environment,
/// then scheme coercion and validation.
pub fn load_config(path: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RouterConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    finalize(config)
}

/// Coerce service URLs and validate.
pub fn finalize(mut config: RouterConfig) -> Result<RouterConfig, ConfigError> {
    normalize_services(&mut config.services);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay values from an environment lookup onto `config`.
///
/// Empty values are ignored so that an exported-but-blank variable keeps
/// the documented default.
pub fn apply_env_overrides<F>(config: &mut RouterConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    for service in ServiceId::ALL {
        if let Some(url) = get(service_env_var(service)) {
            *config.services.base_url_mut(service) = url;
        }
    }

    if let Some(addr) = get("ROUTER_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }

    if let Some(env) = get("APP_ENV") {
        match env.parse() {
            Ok(environment) => config.environment = environment,
            Err(e) => tracing::warn!(value = %env, error = %e, "Ignoring APP_ENV"),
        }
    }

    if let Some(level) = get("ROUTER_LOG_LEVEL") {
        config.observability.log_level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_service_urls() {
        let mut config = RouterConfig::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                ("PRESENCE_SERVICE_URL", "presence.internal:7000"),
                ("FILE_SERVICE_URL", ""),
                ("APP_ENV", "production"),
            ]),
        );

        assert_eq!(config.services.presence, "presence.internal:7000");
        assert_eq!(config.services.file, "http://localhost:8003");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn finalize_coerces_missing_scheme() {
        let mut config = RouterConfig::default();
        config.services.presence = "presence.internal:7000/".into();

        let config = finalize(config).unwrap();
        assert_eq!(config.services.presence, "http://presence.internal:7000");
    }

    #[test]
    fn finalize_reports_every_problem() {
        let mut config = RouterConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.services.group = "http://".into();

        match finalize(config) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
