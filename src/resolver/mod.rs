//! RPC-side resolver integration.
//!
//! # Data Flow
//! ```text
//! "consul://agent:8500/billing?tag=v2"
//!     → target.rs (parse)
//!     → registry.rs (scheme → builder, injected by the caller)
//!     → consul.rs (client + snapshot watch)
//!     → Resolver handle (resolve_now / close)
//!     → AddressListener receives full address sets
//! ```
//!
//! # Design Decisions
//! - No process-wide registration; callers build and pass a registry
//! - Target and agent problems fail synchronously, before a task starts

pub mod consul;
pub mod registry;
pub mod target;

use std::sync::Arc;

use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::watch::{AddressListener, WatchHandle, WatchStatus};

pub use consul::ConsulResolverBuilder;
pub use registry::ResolverRegistry;
pub use target::Target;

/// Errors raised while building a resolver.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("no resolver registered for scheme '{0}'")]
    UnknownScheme(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Creates resolvers for one target scheme.
pub trait ResolverBuilder: Send + Sync {
    fn scheme(&self) -> &str;

    /// Start resolving `target`, pushing address sets to `listener`.
    fn build(
        &self,
        target: &Target,
        listener: Arc<dyn AddressListener>,
    ) -> Result<Resolver, ResolverError>;
}

/// A running resolver. Dropping it stops resolution.
#[derive(Debug)]
pub struct Resolver {
    target: Target,
    handle: WatchHandle,
}

impl Resolver {
    pub fn new(target: Target, handle: WatchHandle) -> Self {
        Self { target, handle }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Re-query the backend now instead of waiting for the long-poll.
    pub fn resolve_now(&self) {
        self.handle.resolve_now();
    }

    /// Stop resolving. Idempotent.
    pub fn close(&self) {
        self.handle.close();
    }

    pub fn status(&self) -> WatchStatus {
        self.handle.status()
    }

    pub async fn closed(&self) -> WatchStatus {
        self.handle.closed().await
    }
}
