//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Watches produce:
//!     → logging.rs (structured log events per cycle and transition)
//!     → metrics.rs (query outcomes, endpoint counts, changes)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (service, index, counts) on every event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
