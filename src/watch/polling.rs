//! One blocking discovery query per cycle.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::discovery::{DiscoveryResult, HealthBackend, HealthQuery, WaitIndex};
use crate::observability::metrics;
use crate::watch::endpoint::{EndpointSnapshot, ServiceEndpoint};

/// Issues long-polling health queries for one service.
#[derive(Clone)]
pub struct PollingEngine {
    backend: Arc<dyn HealthBackend>,
    query: HealthQuery,
}

impl PollingEngine {
    pub fn new(backend: Arc<dyn HealthBackend>, query: HealthQuery) -> Self {
        Self { backend, query }
    }

    pub fn query(&self) -> &HealthQuery {
        &self.query
    }

    pub fn service(&self) -> &str {
        &self.query.service
    }

    /// Block until the backend moves past `wait` (or its timeout elapses),
    /// returning the current healthy set and the backend's new index.
    pub async fn poll(
        &self,
        wait: WaitIndex,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<(EndpointSnapshot, WaitIndex)> {
        let start = Instant::now();
        let result = self
            .backend
            .healthy_instances(&self.query, wait, cancel)
            .await;

        match &result {
            Ok(_) => metrics::record_query(self.service(), "ok", start),
            Err(e) if e.is_canceled() => {}
            Err(e) => metrics::record_query(self.service(), e.kind(), start),
        }

        let (instances, index) = result?;
        let snapshot = instances.into_iter().map(ServiceEndpoint::from).collect();
        Ok((snapshot, index))
    }
}

impl std::fmt::Debug for PollingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingEngine")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
