//! Consul resolver daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │               CONSUL RESOLVER                 │
//!                     │                                               │
//!   Consul agent      │  ┌───────────┐   ┌─────────┐   ┌──────────┐  │
//!   ──────────────────┼─▶│ discovery │──▶│  watch  │──▶│  sinks   │  │
//!   blocking queries  │  │  client   │   │ diff +  │   │ snapshot │  │
//!                     │  └───────────┘   │ state   │   │ / delta  │  │
//!                     │                  └─────────┘   └────┬─────┘  │
//!                     │                                     ▼        │
//!   Operators         │                              ┌────────────┐  │
//!   ◀─────────────────┼──────────────────────────────│ admin API  │  │
//!                     │                              └────────────┘  │
//!                     │  config · observability · resilience · lifecycle
//!                     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use consul_resolver::config::loader::load_config;
use consul_resolver::config::validation::validate_config;
use consul_resolver::config::{DeliveryMode, ResolverConfig, WatchConfig};
use consul_resolver::lifecycle::signals::shutdown_on_signal;
use consul_resolver::observability::{logging, metrics};
use consul_resolver::{Daemon, Shutdown};

#[derive(Parser)]
#[command(name = "consul-resolver")]
#[command(about = "Watch healthy Consul service endpoints", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Consul agent address, overrides the configuration file
    #[arg(long)]
    consul: Option<String>,

    /// Service to watch in addition to the configured ones
    #[arg(short, long)]
    service: Option<String>,

    /// Tag filter for --service
    #[arg(short, long, requires = "service")]
    tag: Option<String>,

    /// Deliver --service changes incrementally instead of as snapshots
    #[arg(long, requires = "service")]
    incremental: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResolverConfig::default(),
    };
    if let Some(address) = cli.consul {
        config.consul.address = address;
    }
    if let Some(service) = cli.service {
        let mut watch = WatchConfig::new(service);
        watch.tag = cli.tag;
        if cli.incremental {
            watch.mode = DeliveryMode::Incremental;
        }
        config.watches.push(watch);
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {}", error);
        }
        std::process::exit(2);
    }

    logging::init(&config.observability);
    tracing::info!("consul-resolver v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        agent = %config.consul.address,
        watches = config.watches.len(),
        wait_secs = config.consul.wait_secs,
        retry = config.retry.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let daemon = Daemon::bind(config).await?;

    let shutdown = Shutdown::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { shutdown_on_signal(&shutdown).await }
    });

    daemon.run(&shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
