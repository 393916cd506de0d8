//! Service watch subsystem.
//!
//! # Data Flow
//! ```text
//! controller.rs (one task per watch)
//!     → polling.rs (blocking health query with the last wait index)
//!     → state.rs + diff.rs (adds/removes against the last observed set)
//!     → sink.rs (snapshot push or incremental pull)
//!     → loop until closed or failed
//! ```
//!
//! # Design Decisions
//! - Per-watch state is owned by its task; no locks
//! - Delivery blocks the loop until the consumer takes it (no buffering,
//!   no dropped intermediate states)
//! - One polling core, two delivery strategies

pub mod controller;
pub mod diff;
pub mod endpoint;
pub mod polling;
pub mod sink;
pub mod state;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{WatchHandle, WatchStatus};
pub use diff::{ChangeOp, ChangeRecord};
pub use endpoint::{EndpointSnapshot, ServiceEndpoint};
pub use sink::{AddressListener, AddressUpdate, ChangeBatch, ChannelListener, ConsumerGone};
pub use watcher::{watch_snapshots, Watcher};
