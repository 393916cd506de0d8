//! Consul agent HTTP client for blocking health queries.
//!
//! # Responsibilities
//! - Build `GET /v1/health/service/<name>` requests with blocking parameters
//! - Read the next wait token from `X-Consul-Index`
//! - Unblock in-flight queries on cancellation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ConsulConfig;
use crate::discovery::types::{
    DiscoveryError, DiscoveryResult, HealthEntry, HealthQuery, ServiceInstance, WaitIndex,
};
use crate::discovery::HealthBackend;

const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Slack added on top of the blocking wait before the HTTP request times out.
const REQUEST_SLACK: Duration = Duration::from_secs(5);

/// Client for a single Consul agent.
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    datacenter: Option<String>,
    wait: Duration,
}

impl ConsulClient {
    /// Create a client for the agent described by `config`.
    ///
    /// Fails immediately when the agent address is not a usable HTTP URL.
    pub fn new(config: &ConsulConfig) -> DiscoveryResult<Self> {
        Self::with_http(config, reqwest::Client::new())
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_http(config: &ConsulConfig, http: reqwest::Client) -> DiscoveryResult<Self> {
        let base_url = parse_agent_address(&config.address)?;
        Ok(Self {
            http,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
            datacenter: config.datacenter.clone().filter(|dc| !dc.is_empty()),
            wait: Duration::from_secs(config.wait_secs),
        })
    }

    /// Base URL of the agent.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Maximum time a blocking query is held open by the agent.
    pub fn wait(&self) -> Duration {
        self.wait
    }

    fn health_url(&self, service: &str) -> DiscoveryResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DiscoveryError::InvalidAddress {
                address: self.base_url.to_string(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["v1", "health", "service", service]);
        Ok(url)
    }

    /// Agent-side wait plus the jitter Consul may add (wait / 16) and slack.
    fn request_timeout(&self) -> Duration {
        self.wait + self.wait / 16 + REQUEST_SLACK
    }

    async fn fetch(
        &self,
        query: &HealthQuery,
        wait: WaitIndex,
    ) -> DiscoveryResult<(Vec<ServiceInstance>, WaitIndex)> {
        let url = self.health_url(&query.service)?;

        let mut params: Vec<(&str, String)> = Vec::with_capacity(5);
        if query.passing_only {
            params.push(("passing", "true".to_string()));
        }
        if let Some(tag) = &query.tag {
            params.push(("tag", tag.clone()));
        }
        if let Some(dc) = &self.datacenter {
            params.push(("dc", dc.clone()));
        }
        if wait.is_blocking() {
            params.push(("index", wait.0.to_string()));
            params.push(("wait", format!("{}s", self.wait.as_secs())));
        }

        let mut request = self
            .http
            .get(url)
            .query(&params)
            .timeout(self.request_timeout());
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        tracing::trace!(service = %query.service, index = %wait, "Issuing health query");

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let index = parse_index(response.headers().get(INDEX_HEADER))?;
        let body = response.bytes().await?;
        let entries: Vec<HealthEntry> =
            serde_json::from_slice(&body).map_err(|e| DiscoveryError::Decode(e.to_string()))?;

        Ok((entries.into_iter().map(ServiceInstance::from).collect(), index))
    }
}

#[async_trait]
impl HealthBackend for ConsulClient {
    async fn healthy_instances(
        &self,
        query: &HealthQuery,
        wait: WaitIndex,
        cancel: &CancellationToken,
    ) -> DiscoveryResult<(Vec<ServiceInstance>, WaitIndex)> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DiscoveryError::Canceled),
            result = self.fetch(query, wait) => match result {
                Err(_) if cancel.is_cancelled() => Err(DiscoveryError::Canceled),
                other => other,
            },
        }
    }
}

/// Accepts `host:port` or a full `http(s)://` URL.
pub(crate) fn parse_agent_address(address: &str) -> DiscoveryResult<Url> {
    let invalid = |reason: String| DiscoveryError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    if address.trim().is_empty() {
        return Err(invalid("address is empty".to_string()));
    }

    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

fn parse_index(header: Option<&HeaderValue>) -> DiscoveryResult<WaitIndex> {
    header
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(WaitIndex)
        .ok_or(DiscoveryError::MissingIndex)
}
