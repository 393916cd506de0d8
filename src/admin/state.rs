//! Shared view of every watch run by the daemon.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::config::{DeliveryMode, WatchConfig};
use crate::discovery::DiscoveryError;
use crate::watch::{ChangeOp, ChangeRecord, ServiceEndpoint, WatchStatus};

/// What the admin API reports for one watch.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub key: String,
    pub service: String,
    pub tag: Option<String>,
    pub mode: DeliveryMode,
    pub status: WatchStatus,
    pub endpoints: Vec<String>,
    pub updates: u64,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct Entry {
    config: WatchConfig,
    status: Option<watch::Receiver<WatchStatus>>,
    endpoints: BTreeSet<String>,
    updates: u64,
    last_error: Option<String>,
}

/// Key identifying a watch: `service`, or `service@tag` when tagged.
pub fn watch_key(config: &WatchConfig) -> String {
    match config.tag.as_deref() {
        Some(tag) if !tag.is_empty() => format!("{}@{}", config.service, tag),
        _ => config.service.clone(),
    }
}

/// Concurrent table of watch views, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct AdminState {
    entries: Arc<DashMap<String, Entry>>,
}

impl AdminState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a watch about to start. Returns its key.
    pub fn register(&self, config: &WatchConfig) -> String {
        let key = watch_key(config);
        self.entries.insert(
            key.clone(),
            Entry {
                config: config.clone(),
                status: None,
                endpoints: BTreeSet::new(),
                updates: 0,
                last_error: None,
            },
        );
        key
    }

    /// Follow the lifecycle of the watch behind `key`.
    pub fn attach_status(&self, key: &str, status: watch::Receiver<WatchStatus>) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status = Some(status);
        }
    }

    /// Replace the endpoint list of `key`.
    pub fn set_endpoints(&self, key: &str, endpoints: &[ServiceEndpoint]) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.endpoints = endpoints.iter().map(ToString::to_string).collect();
            entry.updates += 1;
            entry.last_error = None;
        }
    }

    /// Apply an incremental change list to `key`.
    pub fn apply_changes(&self, key: &str, changes: &[ChangeRecord]) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            for change in changes {
                match change.op {
                    ChangeOp::Add => entry.endpoints.insert(change.endpoint.to_string()),
                    ChangeOp::Remove => entry.endpoints.remove(change.endpoint.as_str()),
                };
            }
            entry.updates += 1;
            entry.last_error = None;
        }
    }

    pub fn record_error(&self, key: &str, error: &DiscoveryError) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.last_error = Some(error.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<ServiceView> {
        self.entries.get(key).map(|entry| view(entry.key(), entry.value()))
    }

    /// All views, ordered by key.
    pub fn views(&self) -> Vec<ServiceView> {
        let mut views: Vec<_> = self
            .entries
            .iter()
            .map(|entry| view(entry.key(), entry.value()))
            .collect();
        views.sort_by(|a, b| a.key.cmp(&b.key));
        views
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn view(key: &str, entry: &Entry) -> ServiceView {
    ServiceView {
        key: key.to_string(),
        service: entry.config.service.clone(),
        tag: entry.config.tag.clone(),
        mode: entry.config.mode,
        status: entry
            .status
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(WatchStatus::Created),
        endpoints: entry.endpoints.iter().cloned().collect(),
        updates: entry.updates,
        last_error: entry.last_error.clone(),
    }
}
