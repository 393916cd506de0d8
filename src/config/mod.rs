//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResolverConfig (validated, immutable)
//!     → handed to the daemon at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ResolverConfig;
pub use schema::ConsulConfig;
pub use schema::WatchConfig;
pub use schema::DeliveryMode;
pub use schema::RetryConfig;
pub use schema::ObservabilityConfig;
pub use schema::AdminConfig;
