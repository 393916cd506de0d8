//! End-to-end watch tests against an in-process Consul agent.

use std::time::Duration;

use consul_resolver::config::ConsulConfig;
use consul_resolver::watch::{ChangeOp, ChangeRecord};
use consul_resolver::{DiscoveryError, WatchStatus, Watcher};

mod common;
use common::MockConsul;

fn consul_config(agent: &MockConsul) -> ConsulConfig {
    ConsulConfig {
        address: agent.address(),
        wait_secs: 5,
        ..ConsulConfig::default()
    }
}

fn rendered(changes: &[ChangeRecord]) -> Vec<(ChangeOp, String)> {
    let mut out: Vec<_> = changes
        .iter()
        .map(|c| (c.op, c.endpoint.to_string()))
        .collect();
    out.sort_by(|a, b| a.1.cmp(&b.1));
    out
}

#[tokio::test]
async fn test_incremental_watch_tracks_membership() {
    let agent = MockConsul::start().await;
    agent.set_instances("api", &[("10.0.0.1", 8080), ("10.0.0.2", 8080)]);

    let mut watcher = Watcher::consul(&consul_config(&agent), "api", None).unwrap();

    let baseline = watcher.next().await.unwrap().unwrap();
    assert_eq!(
        rendered(&baseline),
        vec![
            (ChangeOp::Add, "10.0.0.1:8080".to_string()),
            (ChangeOp::Add, "10.0.0.2:8080".to_string()),
        ]
    );

    agent.set_instances("api", &[("10.0.0.1", 8080), ("10.0.0.3", 8080)]);
    let changes = watcher.next().await.unwrap().unwrap();
    assert_eq!(
        rendered(&changes),
        vec![
            (ChangeOp::Remove, "10.0.0.2:8080".to_string()),
            (ChangeOp::Add, "10.0.0.3:8080".to_string()),
        ]
    );

    let requests = agent.requests();
    assert!(requests.iter().all(|r| r.service == "api"));
    assert!(requests.iter().all(|r| r.params.get("passing").map(String::as_str) == Some("true")));
    assert!(!requests[0].params.contains_key("index"));
    assert_eq!(requests[1].params.get("wait").map(String::as_str), Some("5s"));
    assert!(requests[1].params.contains_key("index"));

    watcher.close();
    assert_eq!(watcher.closed().await, WatchStatus::Canceled);
}

#[tokio::test]
async fn test_query_carries_tag_token_and_datacenter() {
    let agent = MockConsul::start().await;
    agent.set_instances("db", &[("10.0.1.1", 5432)]);

    let config = ConsulConfig {
        token: Some("s3cret".to_string()),
        datacenter: Some("eu-west".to_string()),
        ..consul_config(&agent)
    };
    let mut watcher = Watcher::consul(&config, "db", Some("primary")).unwrap();
    watcher.next().await.unwrap().unwrap();

    let first = &agent.requests()[0];
    assert_eq!(first.token.as_deref(), Some("s3cret"));
    assert_eq!(first.params.get("tag").map(String::as_str), Some("primary"));
    assert_eq!(first.params.get("dc").map(String::as_str), Some("eu-west"));
}

#[tokio::test]
async fn test_unchanged_index_bump_is_silent() {
    let agent = MockConsul::start().await;
    agent.set_instances("api", &[("10.0.0.1", 80)]);

    let mut watcher = Watcher::consul(&consul_config(&agent), "api", None).unwrap();
    watcher.next().await.unwrap().unwrap();

    agent.touch();
    let quiet = tokio::time::timeout(Duration::from_millis(300), watcher.next()).await;
    assert!(quiet.is_err(), "no-op cycle must not produce an item");

    agent.set_instances("api", &[]);
    let changes = watcher.next().await.unwrap().unwrap();
    assert_eq!(rendered(&changes), vec![(ChangeOp::Remove, "10.0.0.1:80".to_string())]);
}

#[tokio::test]
async fn test_node_address_used_when_service_address_empty() {
    let agent = MockConsul::start().await;
    agent.set_entries(
        "cache",
        vec![("192.168.5.5".to_string(), String::new(), 6379)],
    );

    let mut watcher = Watcher::consul(&consul_config(&agent), "cache", None).unwrap();
    let baseline = watcher.next().await.unwrap().unwrap();
    assert_eq!(rendered(&baseline), vec![(ChangeOp::Add, "192.168.5.5:6379".to_string())]);
}

#[tokio::test]
async fn test_agent_error_ends_fail_fast_watch() {
    let agent = MockConsul::start().await;
    agent.fail_next(1);

    let mut watcher = Watcher::consul(&consul_config(&agent), "api", None).unwrap();
    let err = watcher.next().await.unwrap().unwrap_err();
    assert!(matches!(err, DiscoveryError::Status { status: 500, .. }));

    assert!(watcher.next().await.is_none());
    assert_eq!(watcher.closed().await, WatchStatus::Errored);
    assert_eq!(agent.requests().len(), 1);
}

#[tokio::test]
async fn test_resolve_now_issues_immediate_query() {
    let agent = MockConsul::start().await;
    agent.set_instances("api", &[("10.0.0.1", 80)]);

    let mut watcher = Watcher::consul(&consul_config(&agent), "api", None).unwrap();
    watcher.next().await.unwrap().unwrap();

    // Wait for the blocking query to be parked on the agent.
    common::eventually(|| async { agent.requests().len() >= 2 }).await;

    watcher.resolve_now();
    common::eventually(|| async { agent.requests().len() >= 3 }).await;

    let requests = agent.requests();
    assert!(requests[1].params.contains_key("index"));
    assert!(!requests[2].params.contains_key("index"));

    // Membership did not change, so nothing is yielded.
    let quiet = tokio::time::timeout(Duration::from_millis(200), watcher.next()).await;
    assert!(quiet.is_err());
}

#[tokio::test]
async fn test_close_interrupts_blocking_query() {
    let agent = MockConsul::start().await;
    agent.set_instances("api", &[("10.0.0.1", 80)]);

    let mut watcher = Watcher::consul(&consul_config(&agent), "api", None).unwrap();
    watcher.next().await.unwrap().unwrap();
    common::eventually(|| async { agent.requests().len() >= 2 }).await;

    watcher.close();
    let status = tokio::time::timeout(Duration::from_secs(1), watcher.closed())
        .await
        .expect("close must not wait for the agent");
    assert_eq!(status, WatchStatus::Canceled);
    assert!(watcher.next().await.is_none());

    // Closing twice is harmless.
    watcher.close();
}

#[test]
fn test_invalid_agent_address_fails_fast() {
    let config = ConsulConfig {
        address: "http://[::1".to_string(),
        ..ConsulConfig::default()
    };
    let err = Watcher::consul(&config, "api", None).unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidAddress { .. }));
}
