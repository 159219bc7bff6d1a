//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sizes > 0)
//! - Check addresses and the peer URL parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.header_secs == 0 {
        errors.push(ValidationError::new("timeouts.header_secs", "must be greater than 0"));
    }
    if config.timeouts.body_secs == 0 {
        errors.push(ValidationError::new("timeouts.body_secs", "must be greater than 0"));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }
    if config.limits.max_header_line_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_header_line_bytes",
            "must be greater than 0",
        ));
    }

    if config.model.arena_bytes == 0 {
        errors.push(ValidationError::new("model.arena_bytes", "must be greater than 0"));
    }

    if config.peer.enabled {
        if !config.peer.path.starts_with('/') {
            errors.push(ValidationError::new("peer.path", "must start with '/'"));
        } else if let Err(e) = url::Url::parse(&config.peer.url()) {
            errors.push(ValidationError::new("peer.host", format!("invalid peer URL: {}", e)));
        }
        if config.peer.timeout_secs == 0 {
            errors.push(ValidationError::new("peer.timeout_secs", "must be greater than 0"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
