//! Consumer-facing entry points: pull-style [`Watcher`] and push-style
//! snapshot watches.

use std::sync::Arc;

use crate::config::ConsulConfig;
use crate::discovery::{ConsulClient, DiscoveryResult, HealthBackend, HealthQuery};
use crate::resilience::RetryPolicy;
use crate::watch::controller::{self, WatchHandle, WatchStatus};
use crate::watch::polling::PollingEngine;
use crate::watch::sink::{AddressListener, ChangeBatch, Handoff, IncrementalSink, SnapshotSink};

/// Pull-style watch yielding incremental change lists.
///
/// The first item is the initial membership as a list of adds; afterwards
/// only non-empty changes are yielded.
#[derive(Debug)]
pub struct Watcher {
    handle: WatchHandle,
    updates: tokio::sync::mpsc::Receiver<Handoff>,
}

impl Watcher {
    /// Start watching `query` on `backend`.
    pub fn start(backend: Arc<dyn HealthBackend>, query: HealthQuery, policy: RetryPolicy) -> Self {
        let (sink, updates) = IncrementalSink::channel();
        let handle = controller::spawn(PollingEngine::new(backend, query), sink, policy);
        Self { handle, updates }
    }

    /// Connect to the agent in `config` and watch passing instances of
    /// `service`, optionally filtered by `tag`. Fails before any task is
    /// started if the agent address is unusable.
    pub fn consul(config: &ConsulConfig, service: &str, tag: Option<&str>) -> DiscoveryResult<Self> {
        let client = ConsulClient::new(config)?;
        let mut query = HealthQuery::new(service);
        if let Some(tag) = tag {
            query = query.with_tag(tag);
        }
        Ok(Self::start(Arc::new(client), query, RetryPolicy::FailFast))
    }

    /// Wait for the next change list or error.
    ///
    /// Returns `None` once the watch has been closed or has stopped after
    /// its last error.
    pub async fn next(&mut self) -> Option<ChangeBatch> {
        if self.handle.is_closed() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.handle.cancelled() => None,
            handoff = self.updates.recv() => handoff.map(Handoff::accept),
        }
    }

    pub fn resolve_now(&self) {
        self.handle.resolve_now();
    }

    pub fn close(&self) {
        self.handle.close();
    }

    pub fn status(&self) -> WatchStatus {
        self.handle.status()
    }

    pub async fn closed(&self) -> WatchStatus {
        self.handle.closed().await
    }

    pub fn handle(&self) -> &WatchHandle {
        &self.handle
    }
}

/// Start a push-style watch delivering the full set to `listener` on every
/// successful cycle.
pub fn watch_snapshots(
    backend: Arc<dyn HealthBackend>,
    query: HealthQuery,
    listener: Arc<dyn AddressListener>,
    policy: RetryPolicy,
) -> WatchHandle {
    controller::spawn(
        PollingEngine::new(backend, query),
        SnapshotSink::new(listener),
        policy,
    )
}
