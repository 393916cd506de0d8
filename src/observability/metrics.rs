//! Metrics collection and exposition.
//!
//! # Metrics
//! - `consul_resolver_queries_total` (counter): health queries by service, outcome
//! - `consul_resolver_query_duration_seconds` (histogram): blocking query latency
//! - `consul_resolver_endpoints` (gauge): current endpoint count per service
//! - `consul_resolver_changes_total` (counter): membership changes by service, op
//! - `consul_resolver_deliveries_total` (counter): consumer hand-offs by service, mode
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed by the daemon

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::watch::diff::{ChangeOp, ChangeRecord};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed health query.
pub fn record_query(service: &str, outcome: &'static str, start: Instant) {
    counter!(
        "consul_resolver_queries_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "consul_resolver_query_duration_seconds",
        "service" => service.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the endpoint count after a successful cycle.
pub fn record_endpoints(service: &str, count: usize) {
    gauge!("consul_resolver_endpoints", "service" => service.to_string()).set(count as f64);
}

/// Record the membership changes of one cycle.
pub fn record_changes(service: &str, changes: &[ChangeRecord]) {
    let added = changes.iter().filter(|c| c.op == ChangeOp::Add).count() as u64;
    let removed = changes.len() as u64 - added;
    if added > 0 {
        counter!("consul_resolver_changes_total", "service" => service.to_string(), "op" => "add")
            .increment(added);
    }
    if removed > 0 {
        counter!("consul_resolver_changes_total", "service" => service.to_string(), "op" => "remove")
            .increment(removed);
    }
}

/// Record a hand-off to the consumer.
pub fn record_delivery(service: &str, mode: &'static str) {
    counter!(
        "consul_resolver_deliveries_total",
        "service" => service.to_string(),
        "mode" => mode
    )
    .increment(1);
}
