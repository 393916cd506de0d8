//! Resolver target URIs: `<scheme>://<agent-authority>/<service>[?query]`.
//!
//! Recognised query parameters: `tag`, `dc`, `healthy` (`false` includes
//! instances with failing checks).

use std::str::FromStr;

use url::Url;

use crate::discovery::HealthQuery;
use crate::resolver::ResolverError;

/// A parsed resolver target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: String,
    /// Agent `host[:port]`; empty means the builder's default agent.
    pub authority: String,
    /// Service name.
    pub endpoint: String,
    pub tag: Option<String>,
    pub datacenter: Option<String>,
    pub passing_only: bool,
}

impl Target {
    /// Health query described by this target.
    pub fn health_query(&self) -> HealthQuery {
        HealthQuery {
            service: self.endpoint.clone(),
            tag: self.tag.clone(),
            passing_only: self.passing_only,
        }
    }
}

impl FromStr for Target {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ResolverError::InvalidTarget {
            target: s.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(s).map_err(|e| invalid(&e.to_string()))?;

        let authority = match (url.host_str().filter(|h| !h.is_empty()), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        let encoded = url.path().trim_matches('/');
        if encoded.is_empty() {
            return Err(invalid("missing service name"));
        }
        if encoded.contains('/') {
            return Err(invalid("service name must be a single path segment"));
        }
        // The path is kept percent-encoded; the client encodes it again.
        let endpoint = urlencoding::decode(encoded)
            .map_err(|_| invalid("service name is not valid UTF-8"))?;
        if endpoint.contains('/') {
            return Err(invalid("service name must not contain '/'"));
        }

        let mut target = Target {
            scheme: url.scheme().to_string(),
            authority,
            endpoint: endpoint.to_string(),
            tag: None,
            datacenter: None,
            passing_only: true,
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "tag" if !value.is_empty() => target.tag = Some(value.into_owned()),
                "dc" if !value.is_empty() => target.datacenter = Some(value.into_owned()),
                "healthy" => {
                    target.passing_only = value
                        .parse()
                        .map_err(|_| invalid("healthy must be true or false"))?;
                }
                _ => tracing::debug!(target = %s, key = %key, "Ignoring unknown target parameter"),
            }
        }

        Ok(target)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.authority, self.endpoint)
    }
}
