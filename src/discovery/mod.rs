//! Discovery backend subsystem.
//!
//! # Data Flow
//! ```text
//! HealthQuery + WaitIndex
//!     → client.rs (blocking GET /v1/health/service/<name>)
//!     → agent holds the request until the index moves or `wait` elapses
//!     → (instances, X-Consul-Index)
//! ```
//!
//! # Design Decisions
//! - Read-only: no registration or KV writes
//! - Cancellation unblocks in-flight queries and is reported as `Canceled`
//! - One client may be shared by any number of watches

pub mod client;
pub mod types;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use client::ConsulClient;
pub use types::{DiscoveryError, DiscoveryResult, HealthQuery, ServiceInstance, WaitIndex};

/// A backend able to answer long-polling health queries.
#[async_trait]
pub trait HealthBackend: Send + Sync {
    /// Return the instances matching `query`, blocking until the backend's
    /// state moves past `wait` or its own timeout elapses.
    async fn healthy_instances(
        &self,
        query: &HealthQuery,
        wait: WaitIndex,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<(Vec<ServiceInstance>, WaitIndex)>;
}
