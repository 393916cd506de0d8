//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the resolver.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the resolver daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResolverConfig {
    /// Consul agent connection settings.
    pub consul: ConsulConfig,

    /// Services to watch.
    pub watches: Vec<WatchConfig>,

    /// Failure handling for watches.
    pub retry: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Consul agent configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Agent address, `host:port` or a full URL (e.g., "127.0.0.1:8500").
    pub address: String,

    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,

    /// Datacenter to query; the agent's own when unset.
    pub datacenter: Option<String>,

    /// How long the agent may hold a blocking query, in seconds.
    pub wait_secs: u64,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".to_string(),
            token: None,
            datacenter: None,
            wait_secs: 300,
        }
    }
}

/// How a watch hands results to its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Full address set on every successful cycle.
    #[default]
    Snapshot,
    /// Only add/remove changes, and only when something changed.
    Incremental,
}

/// A single service watch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Service name in the Consul catalog.
    pub service: String,

    /// Optional tag filter.
    #[serde(default)]
    pub tag: Option<String>,

    /// Only passing instances (default: true).
    #[serde(default = "default_passing_only")]
    pub passing_only: bool,

    /// Delivery mode (default: snapshot).
    #[serde(default)]
    pub mode: DeliveryMode,
}

fn default_passing_only() -> bool {
    true
}

impl WatchConfig {
    /// Watch passing instances of `service` in snapshot mode.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tag: None,
            passing_only: true,
            mode: DeliveryMode::Snapshot,
        }
    }
}

/// Retry configuration for failed health queries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Keep polling after a failed query instead of stopping the watch.
    pub enabled: bool,

    /// Consecutive failures tolerated before giving up (0 = unlimited).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound on the backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 0,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "consul_resolver=info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,

    /// Bearer token required by the admin API when set.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            api_key: None,
        }
    }
}
