//! Endpoint value types.
//!
//! An endpoint's identity is its rendered `host:port` string. Two endpoints
//! are equal iff their renderings match; the rendering is also the address
//! handed to the RPC connection layer.

use std::collections::hash_set;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::discovery::ServiceInstance;

/// A single network endpoint backing a service. Immutable once built.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    host: String,
    port: u16,
    rendered: String,
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        // IPv6 literals need brackets to stay dialable.
        let rendered = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        Self {
            host,
            port,
            rendered,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` identity string.
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Socket address, when the host is an IP literal.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.rendered.parse().ok()
    }
}

impl PartialEq for ServiceEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.rendered == other.rendered
    }
}

impl Eq for ServiceEndpoint {}

impl Hash for ServiceEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rendered.hash(state);
    }
}

impl PartialOrd for ServiceEndpoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceEndpoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rendered.cmp(&other.rendered)
    }
}

impl std::fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl From<ServiceInstance> for ServiceEndpoint {
    fn from(instance: ServiceInstance) -> Self {
        Self::new(instance.address, instance.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid endpoint '{0}': expected host:port")]
pub struct ParseEndpointError(String);

impl FromStr for ServiceEndpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseEndpointError(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(err)?;
        let port: u16 = port.parse().map_err(|_| err())?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(err());
        }
        Ok(Self::new(host, port))
    }
}

/// The set of endpoints observed in one poll cycle. Membership is the only
/// meaningful property; iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSnapshot {
    endpoints: HashSet<ServiceEndpoint>,
}

impl EndpointSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn contains(&self, endpoint: &ServiceEndpoint) -> bool {
        self.endpoints.contains(endpoint)
    }

    pub fn insert(&mut self, endpoint: ServiceEndpoint) -> bool {
        self.endpoints.insert(endpoint)
    }

    pub fn remove(&mut self, endpoint: &ServiceEndpoint) -> bool {
        self.endpoints.remove(endpoint)
    }

    pub fn iter(&self) -> hash_set::Iter<'_, ServiceEndpoint> {
        self.endpoints.iter()
    }

    /// Endpoints in identity order, for stable output.
    pub fn to_sorted_vec(&self) -> Vec<ServiceEndpoint> {
        let mut endpoints: Vec<_> = self.endpoints.iter().cloned().collect();
        endpoints.sort();
        endpoints
    }
}

impl FromIterator<ServiceEndpoint> for EndpointSnapshot {
    fn from_iter<I: IntoIterator<Item = ServiceEndpoint>>(iter: I) -> Self {
        Self {
            endpoints: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EndpointSnapshot {
    type Item = ServiceEndpoint;
    type IntoIter = hash_set::IntoIter<ServiceEndpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.into_iter()
    }
}

impl<'a> IntoIterator for &'a EndpointSnapshot {
    type Item = &'a ServiceEndpoint;
    type IntoIter = hash_set::Iter<'a, ServiceEndpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_rendered_string() {
        let a = ServiceEndpoint::new("10.0.0.1", 80);
        let b: ServiceEndpoint = "10.0.0.1:80".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "10.0.0.1:80");
        assert_ne!(a, ServiceEndpoint::new("10.0.0.1", 81));
    }

    #[test]
    fn test_ipv6_rendering() {
        let ep = ServiceEndpoint::new("::1", 8500);
        assert_eq!(ep.as_str(), "[::1]:8500");
        assert_eq!(ep.host(), "::1");
        assert!(ep.socket_addr().is_some());

        let parsed: ServiceEndpoint = "[::1]:8500".parse().unwrap();
        assert_eq!(parsed, ep);
    }

    #[test]
    fn test_hostname_has_no_socket_addr() {
        let ep = ServiceEndpoint::new("api.service.consul", 443);
        assert!(ep.socket_addr().is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("no-port".parse::<ServiceEndpoint>().is_err());
        assert!(":80".parse::<ServiceEndpoint>().is_err());
        assert!("host:99999".parse::<ServiceEndpoint>().is_err());
    }

    #[test]
    fn test_snapshot_deduplicates() {
        let snapshot: EndpointSnapshot = ["a:1", "a:1", "b:2"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.to_sorted_vec(),
            vec![ServiceEndpoint::new("a", 1), ServiceEndpoint::new("b", 2)]
        );
    }
}
