//! Query, token, and error types shared by discovery backends.

use serde::Deserialize;
use thiserror::Error;

/// Filter criteria for a health query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthQuery {
    /// Service name as registered in the catalog.
    pub service: String,
    /// Optional tag filter.
    pub tag: Option<String>,
    /// Only return instances whose checks are all passing.
    pub passing_only: bool,
}

impl HealthQuery {
    /// Query for passing instances of `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tag: None,
            passing_only: true,
        }
    }

    /// Restrict the query to instances carrying `tag`.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag = if tag.is_empty() { None } else { Some(tag) };
        self
    }

    /// Include instances with failing checks.
    pub fn include_unhealthy(mut self) -> Self {
        self.passing_only = false;
        self
    }
}

/// Blocking-query wait token (Consul's `X-Consul-Index`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitIndex(pub u64);

impl WaitIndex {
    /// Token that makes the backend answer immediately.
    pub const ZERO: WaitIndex = WaitIndex(0);

    /// Advance to the token observed in a response. Never moves backwards.
    pub fn advance(self, observed: WaitIndex) -> WaitIndex {
        self.max(observed)
    }

    /// Whether a query with this token would block.
    pub fn is_blocking(&self) -> bool {
        self.0 > 0
    }
}

impl From<u64> for WaitIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for WaitIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single healthy instance returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub address: String,
    pub port: u16,
}

/// One element of `GET /v1/health/service/<name>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct HealthEntry {
    pub node: NodeEntry,
    pub service: ServiceEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NodeEntry {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceEntry {
    #[serde(default)]
    pub address: String,
    pub port: u16,
}

impl From<HealthEntry> for ServiceInstance {
    fn from(entry: HealthEntry) -> Self {
        // Consul leaves Service.Address empty when the service uses the node address.
        let address = if entry.service.address.is_empty() {
            entry.node.address
        } else {
            entry.service.address
        };
        Self {
            address,
            port: entry.service.port,
        }
    }
}

/// Errors returned by a discovery backend.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The caller cancelled the query.
    #[error("query canceled")]
    Canceled,

    /// The agent address could not be turned into a URL.
    #[error("invalid agent address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Connection, timeout, or protocol failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The agent answered with a non-success status.
    #[error("agent returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The response carried no usable `X-Consul-Index` header.
    #[error("response missing X-Consul-Index header")]
    MissingIndex,
}

impl DiscoveryError {
    /// True when the failure was caused by cancellation and must stay silent.
    pub fn is_canceled(&self) -> bool {
        matches!(self, DiscoveryError::Canceled)
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::Canceled => "canceled",
            DiscoveryError::InvalidAddress { .. } => "invalid_address",
            DiscoveryError::Transport(_) => "transport",
            DiscoveryError::Status { .. } => "status",
            DiscoveryError::Decode(_) => "decode",
            DiscoveryError::MissingIndex => "missing_index",
        }
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
