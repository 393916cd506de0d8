//! Per-watch mutable state, owned by the background task alone.

use crate::discovery::WaitIndex;
use crate::watch::diff::{diff, ChangeRecord};
use crate::watch::endpoint::EndpointSnapshot;

/// Wait token and last observed endpoint set.
///
/// Only the watch task holds this; it is replaced wholesale on each
/// successful cycle so `seen` always equals the latest completed poll.
#[derive(Debug, Default)]
pub struct WatchState {
    wait_index: WaitIndex,
    seen: EndpointSnapshot,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_index(&self) -> WaitIndex {
        self.wait_index
    }

    pub fn seen(&self) -> &EndpointSnapshot {
        &self.seen
    }

    /// Record a successful poll and return the changes since the last one.
    pub fn apply(&mut self, snapshot: EndpointSnapshot, index: WaitIndex) -> Vec<ChangeRecord> {
        let previous = std::mem::take(&mut self.seen);
        let (changes, seen) = diff(previous, snapshot);
        self.seen = seen;
        self.wait_index = self.wait_index.advance(index);
        changes
    }
}
