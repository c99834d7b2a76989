//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Every problem is reported, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let positive = [
        ("listener.max_sessions", config.listener.max_sessions as u64),
        ("timeouts.resolve_ms", config.timeouts.resolve_ms),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
        ("timeouts.read_ms", config.timeouts.read_ms),
        ("timeouts.write_ms", config.timeouts.write_ms),
        ("timeouts.drain_ms", config.timeouts.drain_ms),
        ("relay.chunk_size", config.relay.chunk_size as u64),
        ("relay.max_target_len", config.relay.max_target_len as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let required = [
        ("resolver.program", &config.resolver.program),
        ("resolver.format", &config.resolver.format),
        ("relay.default_content_type", &config.relay.default_content_type),
        ("hls.watch_url_base", &config.hls.watch_url_base),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
