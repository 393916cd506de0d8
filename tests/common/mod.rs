//! Shared utilities for integration tests: an in-process Consul agent.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// A request seen by the mock agent.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub service: String,
    pub params: HashMap<String, String>,
    pub token: Option<String>,
}

#[derive(Default)]
struct Catalog {
    /// service → (node address, service address, port)
    services: HashMap<String, Vec<(String, String, u16)>>,
    fail_next: usize,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone)]
struct MockState {
    catalog: Arc<Mutex<Catalog>>,
    index: watch::Sender<u64>,
}

/// Mock Consul agent serving `/v1/health/service/{name}` with blocking
/// query semantics: a request whose `index` is at or above the current
/// index is held until the catalog changes or `wait` expires.
pub struct MockConsul {
    addr: SocketAddr,
    state: MockState,
}

impl MockConsul {
    pub async fn start() -> Self {
        let (index, _) = watch::channel(1u64);
        let state = MockState {
            catalog: Arc::new(Mutex::new(Catalog::default())),
            index,
        };

        let app = Router::new()
            .route("/v1/health/service/{name}", get(health_service))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// `host:port` of the agent.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Replace the passing instances of `service` and bump the index.
    pub fn set_instances(&self, service: &str, instances: &[(&str, u16)]) {
        let entries = instances
            .iter()
            .map(|(addr, port)| ("10.99.0.1".to_string(), addr.to_string(), *port))
            .collect();
        self.set_entries(service, entries);
    }

    /// Replace entries as `(node address, service address, port)`.
    pub fn set_entries(&self, service: &str, entries: Vec<(String, String, u16)>) {
        self.state
            .catalog
            .lock()
            .unwrap()
            .services
            .insert(service.to_string(), entries);
        self.state.index.send_modify(|i| *i += 1);
    }

    /// Bump the index without changing any membership.
    pub fn touch(&self) {
        self.state.index.send_modify(|i| *i += 1);
    }

    /// Answer the next `n` requests with HTTP 500.
    pub fn fail_next(&self, n: usize) {
        self.state.catalog.lock().unwrap().fail_next = n;
    }

    pub fn index(&self) -> u64 {
        *self.state.index.borrow()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.catalog.lock().unwrap().requests.clone()
    }
}

async fn health_service(
    State(state): State<MockState>,
    Path(service): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    {
        let mut catalog = state.catalog.lock().unwrap();
        catalog.requests.push(RecordedRequest {
            service: service.clone(),
            params: params.clone(),
            token: headers
                .get("X-Consul-Token")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });
        if catalog.fail_next > 0 {
            catalog.fail_next -= 1;
            return (StatusCode::INTERNAL_SERVER_ERROR, "agent unavailable").into_response();
        }
    }

    let requested: u64 = params
        .get("index")
        .and_then(|i| i.parse().ok())
        .unwrap_or(0);
    let wait = params
        .get("wait")
        .and_then(|w| w.trim_end_matches('s').parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(300));

    let mut rx = state.index.subscribe();
    if requested > 0 {
        let _ = tokio::time::timeout(wait, rx.wait_for(|current| *current > requested)).await;
    }

    let index = *rx.borrow();
    let body: Vec<_> = state
        .catalog
        .lock()
        .unwrap()
        .services
        .get(&service)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|(node, address, port)| {
            json!({
                "Node": { "Node": "node-1", "Address": node },
                "Service": { "ID": format!("{}-{}", service, port), "Service": service, "Address": address, "Port": port },
                "Checks": []
            })
        })
        .collect();

    ([("X-Consul-Index", index.to_string())], Json(body)).into_response()
}

/// Poll `cond` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}
