//! Watch lifecycle: the background poll → diff → notify loop.
//!
//! # States
//! ```text
//! Created → Running → Canceled   (close, or consumer dropped)
//!                   → Errored    (query failed and the retry policy gave up)
//! ```
//!
//! # Design Decisions
//! - One task per watch, strictly sequential: at most one query in flight
//! - Cancellation is checked at the top of every cycle and raced against
//!   both suspension points (query and delivery)
//! - `resolve_now` drops the in-flight long-poll and issues a single
//!   non-blocking query; repeated triggers coalesce

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

use crate::discovery::WaitIndex;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::watch::diff::{ChangeOp, ChangeRecord};
use crate::watch::polling::PollingEngine;
use crate::watch::sink::{Delivery, NotificationSink};
use crate::watch::state::WatchState;

/// Lifecycle state of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    Created,
    Running,
    Canceled,
    Errored,
}

impl WatchStatus {
    /// True once the background task has exited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WatchStatus::Canceled | WatchStatus::Errored)
    }
}

/// Controls one running watch. Dropping the handle closes the watch.
#[derive(Debug)]
pub struct WatchHandle {
    service: String,
    cancel: CancellationToken,
    trigger: Arc<Notify>,
    status: watch::Receiver<WatchStatus>,
}

impl WatchHandle {
    /// Service this watch follows.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Current lifecycle state.
    pub fn status(&self) -> WatchStatus {
        *self.status.borrow()
    }

    /// Receiver following every status transition.
    pub fn subscribe_status(&self) -> watch::Receiver<WatchStatus> {
        self.status.clone()
    }

    /// Ask for an immediate re-query. Never starts a second concurrent query.
    pub fn resolve_now(&self) {
        if !self.cancel.is_cancelled() {
            self.trigger.notify_one();
        }
    }

    /// Stop the watch. Idempotent; never blocks.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(service = %self.service, "Closing watch");
        }
        self.cancel.cancel();
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once `close` has been called.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Wait for the background task to exit and return its final state.
    pub async fn closed(&self) -> WatchStatus {
        let mut status = self.status.clone();
        let final_status = match status.wait_for(|s| s.is_terminal()).await {
            Ok(reported) => *reported,
            // The task is gone without reporting; treat it as canceled.
            Err(_) => WatchStatus::Canceled,
        };
        final_status
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start the background task for one watch. Must be called within a Tokio
/// runtime.
pub fn spawn<S: NotificationSink>(
    engine: PollingEngine,
    sink: S,
    policy: RetryPolicy,
) -> WatchHandle {
    let cancel = CancellationToken::new();
    let trigger = Arc::new(Notify::new());
    let (status_tx, status_rx) = watch::channel(WatchStatus::Created);

    let service = engine.service().to_string();
    let task = WatchTask {
        engine,
        sink,
        policy,
        state: WatchState::new(),
        cancel: cancel.clone(),
        trigger: trigger.clone(),
        status: status_tx,
    };
    tokio::spawn(task.run());

    WatchHandle {
        service,
        cancel,
        trigger,
        status: status_rx,
    }
}

struct WatchTask<S> {
    engine: PollingEngine,
    sink: S,
    policy: RetryPolicy,
    state: WatchState,
    cancel: CancellationToken,
    trigger: Arc<Notify>,
    status: watch::Sender<WatchStatus>,
}

impl<S: NotificationSink> WatchTask<S> {
    async fn run(mut self) {
        let service = self.engine.service().to_string();
        self.status.send_replace(WatchStatus::Running);
        tracing::info!(
            service = %service,
            tag = ?self.engine.query().tag,
            mode = self.sink.mode(),
            "Watch started"
        );

        let mut failures: u32 = 0;
        let mut immediate = false;

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break WatchStatus::Canceled;
            }

            let wait = if immediate {
                WaitIndex::ZERO
            } else {
                self.state.wait_index()
            };
            immediate = false;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break WatchStatus::Canceled,
                _ = self.trigger.notified(), if wait.is_blocking() => {
                    tracing::debug!(service = %service, "Re-resolve requested, restarting query");
                    immediate = true;
                    continue;
                }
                result = self.engine.poll(wait, &self.cancel) => result,
            };

            match result {
                Ok((snapshot, index)) => {
                    failures = 0;
                    let changes = self.state.apply(snapshot, index);
                    log_cycle(&service, self.state.wait_index(), self.state.seen().len(), &changes);
                    metrics::record_endpoints(&service, self.state.seen().len());
                    metrics::record_changes(&service, &changes);

                    let delivery = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break WatchStatus::Canceled,
                        delivery = self.sink.deliver(&service, changes, self.state.seen()) => delivery,
                    };
                    match delivery {
                        Ok(Delivery::Delivered) => {
                            tracing::trace!(service = %service, "Cycle delivered");
                        }
                        Ok(Delivery::Skipped) => {}
                        Err(_) => {
                            tracing::info!(service = %service, "Consumer went away, stopping watch");
                            break WatchStatus::Canceled;
                        }
                    }
                }
                Err(e) if e.is_canceled() => break WatchStatus::Canceled,
                Err(e) => {
                    failures += 1;
                    let retry_in = self.policy.next_delay(failures);
                    tracing::warn!(
                        service = %service,
                        error = %e,
                        attempt = failures,
                        retry_in_ms = retry_in.map(|d| d.as_millis() as u64),
                        "Health query failed"
                    );

                    let surfaced = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break WatchStatus::Canceled,
                        surfaced = self.sink.fail(e) => surfaced,
                    };
                    if surfaced.is_err() {
                        break WatchStatus::Canceled;
                    }

                    match retry_in {
                        None => break WatchStatus::Errored,
                        Some(delay) => {
                            if !backoff(&self.cancel, delay).await {
                                break WatchStatus::Canceled;
                            }
                        }
                    }
                }
            }
        };

        match outcome {
            WatchStatus::Errored => tracing::error!(service = %service, "Watch stopped after query failure"),
            _ => tracing::info!(service = %service, "Watch closed"),
        }
        self.status.send_replace(outcome);
    }
}

/// Sleep before the next attempt. Returns false if cancelled meanwhile.
async fn backoff(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn log_cycle(service: &str, index: WaitIndex, endpoints: usize, changes: &[ChangeRecord]) {
    let added = changes.iter().filter(|c| c.op == ChangeOp::Add).count();
    let removed = changes.len() - added;
    if changes.is_empty() {
        tracing::debug!(service = %service, index = %index, endpoints, "No membership change");
    } else {
        tracing::info!(
            service = %service,
            index = %index,
            endpoints,
            added,
            removed,
            "Membership changed"
        );
    }
}
