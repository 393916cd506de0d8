//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the Consul client and bind the admin listener (fail fast)
//! - Start one watch per configured service
//! - Keep the admin view current from watch deliveries
//! - Close every watch on shutdown and drain their tasks

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{DeliveryMode, ResolverConfig, WatchConfig};
use crate::discovery::{ConsulClient, DiscoveryError, HealthBackend, HealthQuery};
use crate::lifecycle::shutdown::{drain, Shutdown};
use crate::resilience::RetryPolicy;
use crate::watch::{watch_snapshots, AddressListener, ConsumerGone, ServiceEndpoint, Watcher};

const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no services configured to watch")]
    NoWatches,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("failed to bind admin API on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
}

/// A fully initialised daemon, ready to run.
pub struct Daemon {
    config: ResolverConfig,
    backend: Arc<dyn HealthBackend>,
    state: AdminState,
    admin_listener: Option<TcpListener>,
}

impl Daemon {
    /// Validate the agent address and bind the admin listener.
    pub async fn bind(config: ResolverConfig) -> Result<Self, StartupError> {
        let client = ConsulClient::new(&config.consul)?;
        Self::with_backend(config, Arc::new(client)).await
    }

    /// Like [`Daemon::bind`], with a caller-supplied discovery backend.
    pub async fn with_backend(
        config: ResolverConfig,
        backend: Arc<dyn HealthBackend>,
    ) -> Result<Self, StartupError> {
        if config.watches.is_empty() {
            return Err(StartupError::NoWatches);
        }

        let admin_listener = if config.admin.enabled {
            let address = config.admin.bind_address.clone();
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| StartupError::Bind { address, source })?;
            Some(listener)
        } else {
            None
        };

        Ok(Self {
            config,
            backend,
            state: AdminState::new(),
            admin_listener,
        })
    }

    /// Shared view of all watches.
    pub fn state(&self) -> AdminState {
        self.state.clone()
    }

    /// Address the admin API is listening on, if enabled.
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }

    /// Run until `shutdown` fires, then close every watch.
    pub async fn run(mut self, shutdown: &Shutdown) {
        let policy = RetryPolicy::from(&self.config.retry);
        let mut tasks = Vec::with_capacity(self.config.watches.len() + 1);

        for watch in &self.config.watches {
            tasks.push(self.spawn_watch(watch, policy, shutdown.token()));
        }

        if let Some(listener) = self.admin_listener.take() {
            let app = setup_admin_router(self.state.clone(), &self.config.admin);
            let admin_stop = shutdown.token();
            tracing::info!(address = ?listener.local_addr().ok(), "Admin API listening");
            tasks.push(tokio::spawn(async move {
                let server = axum::serve(listener, app)
                    .with_graceful_shutdown(async move { admin_stop.cancelled().await });
                if let Err(e) = server.await {
                    tracing::error!(error = %e, "Admin API failed");
                }
            }));
        }

        tracing::info!(
            watches = self.config.watches.len(),
            agent = %self.config.consul.address,
            "Resolver daemon running"
        );

        shutdown.wait().await;
        tracing::info!("Shutdown requested, closing watches");
        let finished = drain(tasks, DRAIN_DEADLINE).await;
        tracing::info!(finished, "Resolver daemon stopped");
    }

    fn spawn_watch(
        &self,
        config: &WatchConfig,
        policy: RetryPolicy,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        let query = health_query(config);
        let key = self.state.register(config);
        let state = self.state.clone();

        match config.mode {
            DeliveryMode::Snapshot => {
                let listener = ViewListener {
                    key: key.clone(),
                    state: state.clone(),
                };
                let handle = watch_snapshots(self.backend.clone(), query, Arc::new(listener), policy);
                state.attach_status(&key, handle.subscribe_status());

                tokio::spawn(async move {
                    stop.cancelled().await;
                    handle.close();
                    handle.closed().await;
                })
            }
            DeliveryMode::Incremental => {
                let mut watcher = Watcher::start(self.backend.clone(), query, policy);
                state.attach_status(&key, watcher.handle().subscribe_status());

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            _ = stop.cancelled() => break,
                            batch = watcher.next() => match batch {
                                Some(Ok(changes)) => {
                                    for change in &changes {
                                        tracing::info!(
                                            watch = %key,
                                            op = change.op.as_str(),
                                            endpoint = %change.endpoint,
                                            "Endpoint change"
                                        );
                                    }
                                    state.apply_changes(&key, &changes);
                                }
                                Some(Err(e)) => {
                                    tracing::warn!(watch = %key, error = %e, "Watch reported error");
                                    state.record_error(&key, &e);
                                }
                                None => {
                                    // Watch has stopped; keep its view until shutdown.
                                    stop.cancelled().await;
                                    break;
                                }
                            },
                        }
                    }
                    watcher.close();
                    watcher.closed().await;
                })
            }
        }
    }
}

fn health_query(config: &WatchConfig) -> HealthQuery {
    let mut query = HealthQuery::new(config.service.clone());
    if let Some(tag) = &config.tag {
        query = query.with_tag(tag.clone());
    }
    if !config.passing_only {
        query = query.include_unhealthy();
    }
    query
}

/// Feeds snapshot deliveries into the admin view.
struct ViewListener {
    key: String,
    state: AdminState,
}

#[async_trait]
impl AddressListener for ViewListener {
    async fn on_address_set_changed(
        &self,
        endpoints: Vec<ServiceEndpoint>,
    ) -> Result<(), ConsumerGone> {
        tracing::info!(
            watch = %self.key,
            endpoints = ?endpoints.iter().map(ServiceEndpoint::as_str).collect::<Vec<_>>(),
            "Address set updated"
        );
        self.state.set_endpoints(&self.key, &endpoints);
        Ok(())
    }

    async fn on_error(&self, error: DiscoveryError) -> Result<(), ConsumerGone> {
        tracing::warn!(watch = %self.key, error = %error, "Watch reported error");
        self.state.record_error(&self.key, &error);
        Ok(())
    }
}
