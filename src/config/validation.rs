//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (wait > 0, delays ordered and bounded)
//! - Detect duplicate watches
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResolverConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ResolverConfig;
use crate::discovery::client::parse_agent_address;

/// Upper bound for `retry.max_delay_ms` (one hour).
pub const MAX_RETRY_DELAY_MS: u64 = 60 * 60 * 1000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("consul.address is invalid: {0}")]
    AgentAddress(String),

    #[error("consul.wait_secs must be greater than 0")]
    ZeroWait,

    #[error("consul.wait_secs must not exceed 600 (agent maximum)")]
    WaitTooLong,

    #[error("watches[{0}].service must not be empty")]
    EmptyService(usize),

    #[error("watch for service '{0}' is declared more than once")]
    DuplicateWatch(String),

    #[error("retry.base_delay_ms must be greater than 0")]
    ZeroBaseDelay,

    #[error("retry.max_delay_ms must be >= retry.base_delay_ms")]
    DelayOrder,

    #[error("retry.max_delay_ms must not exceed {MAX_RETRY_DELAY_MS}")]
    DelayTooLong,

    #[error("{field} is not a socket address: {value}")]
    BindAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ResolverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_agent_address(&config.consul.address) {
        errors.push(ValidationError::AgentAddress(e.to_string()));
    }
    if config.consul.wait_secs == 0 {
        errors.push(ValidationError::ZeroWait);
    } else if config.consul.wait_secs > 600 {
        errors.push(ValidationError::WaitTooLong);
    }

    let mut seen = HashSet::new();
    for (i, watch) in config.watches.iter().enumerate() {
        if watch.service.trim().is_empty() {
            errors.push(ValidationError::EmptyService(i));
            continue;
        }
        let key = (watch.service.as_str(), watch.tag.as_deref().unwrap_or(""));
        if !seen.insert(key) {
            errors.push(ValidationError::DuplicateWatch(watch.service.clone()));
        }
    }

    if config.retry.enabled {
        if config.retry.base_delay_ms == 0 {
            errors.push(ValidationError::ZeroBaseDelay);
        }
        if config.retry.max_delay_ms < config.retry.base_delay_ms {
            errors.push(ValidationError::DelayOrder);
        }
        if config.retry.max_delay_ms > MAX_RETRY_DELAY_MS {
            errors.push(ValidationError::DelayTooLong);
        }
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BindAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
