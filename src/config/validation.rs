//! Configuration validation logic.

use std::net::SocketAddr;

use crate::config::schema::BalancerConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a BalancerConfig for semantic correctness.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Addresses must be dialable socket addresses
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError(format!(
            "listener.bind_address '{}' is not a socket address",
            config.listener.bind_address
        )));
    }
    for backend in &config.backends {
        if backend.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError(format!(
                "backend address '{}' is not a socket address",
                backend.address
            )));
        }
    }

    // 2. Validate cadence and budgets
    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError(
            "health_check.interval_secs must be > 0".to_string(),
        ));
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError(
            "retries.max_attempts must be > 0".to_string(),
        ));
    }
    if config.timeouts.connect_secs == 0 || config.timeouts.read_secs == 0 {
        errors.push(ValidationError(
            "timeouts must be > 0".to_string(),
        ));
    }

    // An empty backend list is legal; every request then answers 502.
    if config.backends.is_empty() {
        tracing::warn!("No backends configured, all requests will receive 502");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
