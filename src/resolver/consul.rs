//! `consul://` resolver builder.

use std::sync::Arc;

use crate::config::ConsulConfig;
use crate::discovery::ConsulClient;
use crate::resilience::RetryPolicy;
use crate::resolver::{Resolver, ResolverBuilder, ResolverError, Target};
use crate::watch::{watch_snapshots, AddressListener};

/// Scheme handled by [`ConsulResolverBuilder`].
pub const SCHEME: &str = "consul";

/// Builds snapshot-mode watches against a Consul agent.
///
/// The target authority selects the agent; when empty, `defaults.address`
/// is used. Token and wait settings always come from `defaults`.
#[derive(Debug, Clone)]
pub struct ConsulResolverBuilder {
    defaults: ConsulConfig,
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl ConsulResolverBuilder {
    pub fn new(defaults: ConsulConfig) -> Self {
        Self {
            defaults,
            http: reqwest::Client::new(),
            policy: RetryPolicy::FailFast,
        }
    }

    /// Use `policy` for every resolver built from now on.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for ConsulResolverBuilder {
    fn default() -> Self {
        Self::new(ConsulConfig::default())
    }
}

impl ResolverBuilder for ConsulResolverBuilder {
    fn scheme(&self) -> &str {
        SCHEME
    }

    fn build(
        &self,
        target: &Target,
        listener: Arc<dyn AddressListener>,
    ) -> Result<Resolver, ResolverError> {
        let mut config = self.defaults.clone();
        if !target.authority.is_empty() {
            config.address = target.authority.clone();
        }
        if target.datacenter.is_some() {
            config.datacenter = target.datacenter.clone();
        }

        let client = ConsulClient::with_http(&config, self.http.clone())?;
        tracing::info!(
            target = %target,
            agent = %client.base_url(),
            "Building consul resolver"
        );

        let handle = watch_snapshots(
            Arc::new(client),
            target.health_query(),
            listener,
            self.policy,
        );
        Ok(Resolver::new(target.clone(), handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryError;
    use crate::resolver::ResolverRegistry;
    use crate::watch::{AddressUpdate, ChannelListener, WatchStatus};

    #[tokio::test]
    async fn test_unreachable_agent_surfaces_error() {
        let mut registry = ResolverRegistry::new();
        registry.register(ConsulResolverBuilder::default());

        let (listener, mut rx) = ChannelListener::new(1);
        // Port 1 on loopback refuses connections immediately.
        let resolver = registry
            .resolve("consul://127.0.0.1:1/api", Arc::new(listener))
            .unwrap();

        match rx.recv().await {
            Some(AddressUpdate::Failed(DiscoveryError::Transport(_))) => {}
            other => panic!("expected transport failure, got {:?}", other),
        }
        assert_eq!(resolver.closed().await, WatchStatus::Errored);
    }

    #[test]
    fn test_bad_default_agent_fails_at_build() {
        let builder = ConsulResolverBuilder::new(ConsulConfig {
            address: "ftp://agent".to_string(),
            ..ConsulConfig::default()
        });
        let (listener, _rx) = ChannelListener::new(1);
        let target: Target = "consul:///api".parse().unwrap();

        let err = builder.build(&target, Arc::new(listener)).unwrap_err();
        assert!(matches!(
            err,
            ResolverError::Discovery(DiscoveryError::InvalidAddress { .. })
        ));
    }
}
