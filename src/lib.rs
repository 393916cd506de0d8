//! Consul service resolver library.
//!
//! Watches healthy instances of Consul services through blocking queries,
//! diffs successive results, and hands changes to consumers either as full
//! address snapshots or as incremental add/remove records.

pub mod admin;
pub mod config;
pub mod discovery;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod resolver;
pub mod watch;

pub use config::schema::ResolverConfig;
pub use discovery::{ConsulClient, DiscoveryError, HealthQuery};
pub use lifecycle::{Daemon, Shutdown};
pub use resilience::RetryPolicy;
pub use resolver::{ConsulResolverBuilder, ResolverRegistry, Target};
pub use watch::{ChangeOp, ChangeRecord, ServiceEndpoint, WatchHandle, WatchStatus, Watcher};
