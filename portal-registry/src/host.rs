//! Host lookup boundary
//!
//! Hosts are user devices known to the out-of-scope topology subsystem.
//! This crate only consumes them through [`HostResolver`]; the in-memory
//! implementation backs tests and embedders without a topology provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Identifier of a known network endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostId(String);

impl HostId {
    /// Create a host id from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A known network endpoint (a user device)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Endpoint identifier
    pub id: HostId,
    /// IPv4 addresses attached to the endpoint
    pub addresses: Vec<Ipv4Addr>,
}

impl Host {
    /// Create a new host
    pub fn new(id: impl Into<String>, addresses: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            id: HostId::new(id),
            addresses: addresses.into_iter().collect(),
        }
    }
}

/// Lookup of known hosts by IPv4 address
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// All known hosts carrying the given address
    async fn hosts_by_ip(&self, address: Ipv4Addr) -> Vec<Host>;
}

/// In-memory host resolver (for testing/development)
#[derive(Clone, Default)]
pub struct InMemoryHostResolver {
    hosts: Arc<RwLock<HashMap<HostId, Host>>>,
}

impl InMemoryHostResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a host
    pub async fn add_host(&self, host: Host) {
        self.hosts.write().await.insert(host.id.clone(), host);
    }

    /// Remove a host
    pub async fn remove_host(&self, id: &HostId) {
        self.hosts.write().await.remove(id);
    }

    /// Remove all hosts
    pub async fn clear(&self) {
        self.hosts.write().await.clear();
    }

    /// Number of known hosts
    pub async fn count(&self) -> usize {
        self.hosts.read().await.len()
    }
}

#[async_trait]
impl HostResolver for InMemoryHostResolver {
    async fn hosts_by_ip(&self, address: Ipv4Addr) -> Vec<Host> {
        let hosts = self.hosts.read().await;
        hosts
            .values()
            .filter(|h| h.addresses.contains(&address))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hosts_by_ip() {
        let resolver = InMemoryHostResolver::new();
        resolver
            .add_host(Host::new("h1", [Ipv4Addr::new(10, 0, 0, 5)]))
            .await;
        resolver
            .add_host(Host::new("h2", [Ipv4Addr::new(10, 0, 0, 6)]))
            .await;

        let hits = resolver.hosts_by_ip(Ipv4Addr::new(10, 0, 0, 5)).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, HostId::new("h1"));

        assert!(resolver.hosts_by_ip(Ipv4Addr::new(10, 0, 0, 7)).await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_address_returns_all_hosts() {
        let resolver = InMemoryHostResolver::new();
        let shared = Ipv4Addr::new(10, 0, 0, 9);
        resolver.add_host(Host::new("h1", [shared])).await;
        resolver.add_host(Host::new("h2", [shared])).await;

        assert_eq!(resolver.hosts_by_ip(shared).await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_host() {
        let resolver = InMemoryHostResolver::new();
        resolver
            .add_host(Host::new("h1", [Ipv4Addr::new(10, 0, 0, 5)]))
            .await;
        assert_eq!(resolver.count().await, 1);

        resolver.remove_host(&HostId::new("h1")).await;
        assert_eq!(resolver.count().await, 0);
    }
}
