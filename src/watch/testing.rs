//! Scripted in-memory backend for watch tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::discovery::{
    DiscoveryError, DiscoveryResult, HealthBackend, HealthQuery, ServiceInstance, WaitIndex,
};

pub(crate) enum Step {
    Instances(Vec<(&'static str, u16)>, u64),
    Fail(DiscoveryError),
}

pub(crate) fn ok(addrs: &[(&'static str, u16)], index: u64) -> Step {
    Step::Instances(addrs.to_vec(), index)
}

pub(crate) fn fail() -> Step {
    Step::Fail(DiscoveryError::Status {
        status: 500,
        body: "agent unavailable".to_string(),
    })
}

/// Replays steps in order; once exhausted every query blocks until cancelled.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    waits: Mutex<Vec<WaitIndex>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        }
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Wait tokens received, in call order.
    pub fn waits(&self) -> Vec<WaitIndex> {
        self.waits.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.waits.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthBackend for ScriptedBackend {
    async fn healthy_instances(
        &self,
        _query: &HealthQuery,
        wait: WaitIndex,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<(Vec<ServiceInstance>, WaitIndex)> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.waits.lock().unwrap().push(wait);
        let step = self.steps.lock().unwrap().pop_front();
        tokio::task::yield_now().await;

        match step {
            Some(Step::Instances(addrs, index)) => Ok((
                addrs
                    .into_iter()
                    .map(|(address, port)| ServiceInstance {
                        address: address.to_string(),
                        port,
                    })
                    .collect(),
                WaitIndex(index),
            )),
            Some(Step::Fail(e)) => Err(e),
            None => {
                cancel.cancelled().await;
                Err(DiscoveryError::Canceled)
            }
        }
    }
}
