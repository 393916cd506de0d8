//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed health query (not canceled):
//!     → error delivered to the consumer
//!     → retries.rs (policy: stop, or retry?)
//!     → backoff.rs (how long to wait before the next poll)
//! ```
//!
//! # Design Decisions
//! - Retrying is an explicit, per-watch policy, never implicit
//! - Jittered backoff prevents thundering herd against the agent
//! - Backoff sleeps are cancellable

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
