//! Catalog entry resolution
//!
//! Turns raw catalog entries into portal services. An entry only becomes a
//! service when its address maps to exactly one known host; anything
//! ambiguous or unknown is dropped here and never reaches the registry.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

use portal_registry::{DiscoverySource, HostResolver, Service, ServiceId};

use crate::client::CatalogEntry;

/// Resolves catalog entries against the known-host topology
pub struct CatalogResolver {
    hosts: Arc<dyn HostResolver>,
}

impl CatalogResolver {
    /// Create a resolver backed by the given host lookup
    pub fn new(hosts: Arc<dyn HostResolver>) -> Self {
        Self { hosts }
    }

    /// Resolve a batch of entries. Entries that do not map to exactly one
    /// known host are skipped; the result never contains partial services.
    pub async fn resolve(&self, entries: Vec<CatalogEntry>) -> Vec<Service> {
        let mut services = Vec::new();
        for entry in &entries {
            if let Some(service) = self.resolve_entry(entry).await {
                if !services.contains(&service) {
                    services.push(service);
                }
            }
        }
        services
    }

    async fn resolve_entry(&self, entry: &CatalogEntry) -> Option<Service> {
        // the service-level address overrides the node address when set
        let raw_address = if entry.service_address.is_empty() {
            &entry.address
        } else {
            &entry.service_address
        };

        let address: Ipv4Addr = match raw_address.parse() {
            Ok(address) => address,
            Err(_) => {
                warn!(
                    "could not resolve catalog entry {}: bad address {}",
                    entry.service_id, raw_address
                );
                return None;
            }
        };

        let mut hosts = self.hosts.hosts_by_ip(address).await;
        let host = match hosts.len() {
            1 => hosts.remove(0),
            0 => {
                debug!("no host found with ip address {}", address);
                return None;
            }
            _ => {
                debug!("more than one host found with ip address {}", address);
                return None;
            }
        };

        let mut builder = Service::builder()
            .with_id(ServiceId::new(entry.service_id.clone()))
            .with_name(&entry.service_name)
            .with_addresses(host.addresses.iter().copied())
            .with_port(entry.service_port)
            .with_source(DiscoverySource::Consul)
            .with_host(host.id);

        // the first tag, when present, names the portal icon
        if let Some(tag) = entry.service_tags.first() {
            builder = builder.with_icon(tag);
        }

        match builder.build() {
            Ok(service) => Some(service),
            Err(e) => {
                warn!("dropping catalog entry {}: {}", entry.service_id, e);
                None
            }
        }
    }
}
