//! Delivery strategies for cycle results.
//!
//! # Strategies
//! - Snapshot: push the full set to an [`AddressListener`] on every cycle
//! - Incremental: hand non-empty change lists to a pull-style [`Watcher`]
//!
//! Both block the watch loop until the consumer takes the result, and both
//! report a consumer that has gone away so the loop can stop.
//!
//! [`Watcher`]: crate::watch::Watcher

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::discovery::DiscoveryError;
use crate::observability::metrics;
use crate::watch::diff::ChangeRecord;
use crate::watch::endpoint::{EndpointSnapshot, ServiceEndpoint};

/// Item carried to a pull-style consumer.
pub type ChangeBatch = Result<Vec<ChangeRecord>, DiscoveryError>;

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Nothing to hand over this cycle.
    Skipped,
}

/// The consumer side has gone away; the watch should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerGone;

/// Consumer of full address sets, typically an RPC connection layer.
#[async_trait]
pub trait AddressListener: Send + Sync {
    /// Replace the consumer's entire address list.
    ///
    /// Returning `Err(ConsumerGone)` stops the watch.
    async fn on_address_set_changed(
        &self,
        endpoints: Vec<ServiceEndpoint>,
    ) -> Result<(), ConsumerGone>;

    /// A health query failed for a reason other than cancellation.
    async fn on_error(&self, error: DiscoveryError) -> Result<(), ConsumerGone>;
}

/// Strategy used by the watch loop to hand results to its consumer.
#[async_trait]
pub trait NotificationSink: Send + 'static {
    /// Label for logs and metrics.
    fn mode(&self) -> &'static str;

    /// Deliver one successful cycle.
    async fn deliver(
        &mut self,
        service: &str,
        changes: Vec<ChangeRecord>,
        current: &EndpointSnapshot,
    ) -> Result<Delivery, ConsumerGone>;

    /// Surface a query failure.
    async fn fail(&mut self, error: DiscoveryError) -> Result<(), ConsumerGone>;
}

/// Pushes the whole set every cycle, changed or not.
pub struct SnapshotSink {
    listener: Arc<dyn AddressListener>,
}

impl SnapshotSink {
    pub fn new(listener: Arc<dyn AddressListener>) -> Self {
        Self { listener }
    }
}

#[async_trait]
impl NotificationSink for SnapshotSink {
    fn mode(&self) -> &'static str {
        "snapshot"
    }

    async fn deliver(
        &mut self,
        service: &str,
        _changes: Vec<ChangeRecord>,
        current: &EndpointSnapshot,
    ) -> Result<Delivery, ConsumerGone> {
        self.listener
            .on_address_set_changed(current.to_sorted_vec())
            .await?;
        metrics::record_delivery(service, self.mode());
        Ok(Delivery::Delivered)
    }

    async fn fail(&mut self, error: DiscoveryError) -> Result<(), ConsumerGone> {
        self.listener.on_error(error).await
    }
}

/// A batch offered to the consumer. The sender stays blocked until the
/// consumer acknowledges it, or drops it unacknowledged.
#[derive(Debug)]
pub struct Handoff {
    pub batch: ChangeBatch,
    ack: oneshot::Sender<()>,
}

impl Handoff {
    /// Take the batch, releasing the watch loop.
    pub fn accept(self) -> ChangeBatch {
        let _ = self.ack.send(());
        self.batch
    }
}

/// Hands only non-empty change lists to the consumer, one at a time.
///
/// Nothing is buffered: `deliver` returns once the consumer has taken the
/// batch, so the next query is not issued before that.
pub struct IncrementalSink {
    tx: mpsc::Sender<Handoff>,
}

impl IncrementalSink {
    /// Create the sink and the receiving end for the consumer.
    pub fn channel() -> (Self, mpsc::Receiver<Handoff>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    async fn hand_over(&self, batch: ChangeBatch) -> Result<(), ConsumerGone> {
        let (ack, taken) = oneshot::channel();
        self.tx
            .send(Handoff { batch, ack })
            .await
            .map_err(|_| ConsumerGone)?;
        taken.await.map_err(|_| ConsumerGone)
    }
}

#[async_trait]
impl NotificationSink for IncrementalSink {
    fn mode(&self) -> &'static str {
        "incremental"
    }

    async fn deliver(
        &mut self,
        service: &str,
        changes: Vec<ChangeRecord>,
        _current: &EndpointSnapshot,
    ) -> Result<Delivery, ConsumerGone> {
        if changes.is_empty() {
            return Ok(Delivery::Skipped);
        }
        self.hand_over(Ok(changes)).await?;
        metrics::record_delivery(service, self.mode());
        Ok(Delivery::Delivered)
    }

    async fn fail(&mut self, error: DiscoveryError) -> Result<(), ConsumerGone> {
        self.hand_over(Err(error)).await
    }
}

/// Update forwarded by [`ChannelListener`].
#[derive(Debug)]
pub enum AddressUpdate {
    Addresses(Vec<ServiceEndpoint>),
    Failed(DiscoveryError),
}

/// [`AddressListener`] that forwards into a bounded channel, so a slow
/// reader holds back the watch loop. Dropping the receiver stops the watch.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::Sender<AddressUpdate>,
}

impl ChannelListener {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AddressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AddressListener for ChannelListener {
    async fn on_address_set_changed(
        &self,
        endpoints: Vec<ServiceEndpoint>,
    ) -> Result<(), ConsumerGone> {
        self.tx
            .send(AddressUpdate::Addresses(endpoints))
            .await
            .map_err(|_| ConsumerGone)
    }

    async fn on_error(&self, error: DiscoveryError) -> Result<(), ConsumerGone> {
        self.tx
            .send(AddressUpdate::Failed(error))
            .await
            .map_err(|_| ConsumerGone)
    }
}
