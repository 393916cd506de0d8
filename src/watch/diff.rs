//! Membership diffing between consecutive snapshots.

use serde::Serialize;

use crate::watch::endpoint::{EndpointSnapshot, ServiceEndpoint};

/// Kind of membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Add,
    Remove,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Add => "add",
            ChangeOp::Remove => "remove",
        }
    }
}

/// A single add/remove of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeRecord {
    pub op: ChangeOp,
    pub endpoint: ServiceEndpoint,
}

impl ChangeRecord {
    pub fn add(endpoint: ServiceEndpoint) -> Self {
        Self {
            op: ChangeOp::Add,
            endpoint,
        }
    }

    pub fn remove(endpoint: ServiceEndpoint) -> Self {
        Self {
            op: ChangeOp::Remove,
            endpoint,
        }
    }
}

/// Compute the changes turning `previous` into `current`.
///
/// Returns the change list and the new seen set, which is exactly `current`.
/// Runs in `O(|previous| + |current|)`; an empty list means "no changes".
/// Each endpoint appears at most once, never as both add and remove.
pub fn diff(
    mut previous: EndpointSnapshot,
    current: EndpointSnapshot,
) -> (Vec<ChangeRecord>, EndpointSnapshot) {
    let mut changes = Vec::new();

    for endpoint in current.iter() {
        // Whatever is left in `previous` afterwards has disappeared.
        if !previous.remove(endpoint) {
            changes.push(ChangeRecord::add(endpoint.clone()));
        }
    }
    changes.extend(previous.into_iter().map(ChangeRecord::remove));

    (changes, current)
}

/// Replay `changes` onto `set`.
pub fn apply(set: &mut EndpointSnapshot, changes: &[ChangeRecord]) {
    for change in changes {
        match change.op {
            ChangeOp::Add => {
                set.insert(change.endpoint.clone());
            }
            ChangeOp::Remove => {
                set.remove(&change.endpoint);
            }
        }
    }
}
