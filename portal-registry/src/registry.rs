//! Authoritative service registry
//!
//! Holds every service the portal offers, both statically configured and
//! catalog-discovered. The registry enforces value uniqueness and removes a
//! service's connections together with the service, so no caller can observe
//! a connection whose service is gone.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::connection::ConnectionRegistry;
use crate::service::{DiscoverySource, Service, ServiceId};

/// Registry of portal services with cascading connection removal
#[derive(Clone)]
pub struct ServiceRegistry {
    services: Arc<RwLock<Vec<Service>>>,
    connections: Arc<ConnectionRegistry>,
}

impl ServiceRegistry {
    /// Create an empty registry backed by the given connection registry
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            services: Arc::new(RwLock::new(Vec::new())),
            connections,
        }
    }

    /// Add a service. Returns `false` without mutating when a value-equal
    /// service is already registered.
    pub async fn add_service(&self, service: Service) -> bool {
        let mut services = self.services.write().await;
        if services.contains(&service) {
            debug!("could not add service {}: already registered", service);
            return false;
        }

        info!("added service {}", service);
        services.push(service);
        true
    }

    /// Remove a service and every connection referencing it.
    ///
    /// Connections are removed first so no dangling connection is ever
    /// observable. Returns `false` when the service is not registered.
    pub async fn remove_service(&self, service: &Service) -> bool {
        let mut services = self.services.write().await;
        let Some(position) = services.iter().position(|s| s == service) else {
            return false;
        };

        for connection in self.connections.connections_for_service(service).await {
            self.connections.remove_connection(&connection).await;
        }

        services.remove(position);
        info!("removed service {}", service);
        true
    }

    /// All registered services
    pub async fn services(&self) -> Vec<Service> {
        self.services.read().await.clone()
    }

    /// Whether a value-equal service is registered
    pub async fn contains(&self, service: &Service) -> bool {
        self.services.read().await.contains(service)
    }

    /// The service with the given id.
    ///
    /// Returns `None` when the id is unknown, or when more than one service
    /// carries it (corrupt state, logged as a warning).
    pub async fn service_by_id(&self, id: &ServiceId) -> Option<Service> {
        let services = self.services.read().await;
        let mut matches = services.iter().filter(|s| s.id() == id);

        let first = matches.next()?;
        if matches.next().is_some() {
            warn!("more than one service with id {}", id);
            return None;
        }
        Some(first.clone())
    }

    /// All services with the given name
    pub async fn services_by_name(&self, name: &str) -> Vec<Service> {
        let services = self.services.read().await;
        services
            .iter()
            .filter(|s| s.name() == name)
            .cloned()
            .collect()
    }

    /// All services reachable on the given address
    pub async fn services_by_ip(&self, address: Ipv4Addr) -> Vec<Service> {
        let services = self.services.read().await;
        services
            .iter()
            .filter(|s| s.addresses().contains(&address))
            .cloned()
            .collect()
    }

    /// All services created by the given discovery source
    pub async fn services_from(&self, source: DiscoverySource) -> Vec<Service> {
        let services = self.services.read().await;
        services
            .iter()
            .filter(|s| s.source() == source)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::host::Host;
    use crate::service::ServiceId;

    fn registries() -> (ServiceRegistry, Arc<ConnectionRegistry>) {
        let connections = Arc::new(ConnectionRegistry::new());
        (ServiceRegistry::new(connections.clone()), connections)
    }

    fn service(id: &str, name: &str, port: u16) -> Service {
        Service::builder()
            .with_id(ServiceId::new(id))
            .with_name(name)
            .with_address(Ipv4Addr::new(10, 0, 0, 5))
            .with_port(port)
            .with_source(DiscoverySource::Consul)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_rejects_value_duplicate() {
        let (registry, _) = registries();

        assert!(registry.add_service(service("web-1", "web", 8080)).await);
        // same value under a different id is still a duplicate
        assert!(!registry.add_service(service("web-2", "web", 8080)).await);
        assert_eq!(registry.services().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_service_is_noop() {
        let (registry, _) = registries();
        assert!(!registry.remove_service(&service("web-1", "web", 8080)).await);
    }

    #[tokio::test]
    async fn test_remove_cascades_connections() {
        let (registry, connections) = registries();
        let web = service("web-1", "web", 8080);
        let mail = service("mail-1", "mail", 25);

        registry.add_service(web.clone()).await;
        registry.add_service(mail.clone()).await;

        let h1 = Host::new("h1", [Ipv4Addr::new(10, 0, 1, 1)]);
        let h2 = Host::new("h2", [Ipv4Addr::new(10, 0, 1, 2)]);
        connections
            .add_connection(Connection::new(h1.clone(), web.clone()))
            .await;
        connections
            .add_connection(Connection::new(h2, web.clone()))
            .await;
        connections
            .add_connection(Connection::new(h1, mail.clone()))
            .await;

        assert!(registry.remove_service(&web).await);

        assert!(connections.connections_for_service(&web).await.is_empty());
        // unrelated connections survive
        assert_eq!(connections.connections_for_service(&mail).await.len(), 1);
        assert!(!registry.contains(&web).await);
    }

    #[tokio::test]
    async fn test_queries() {
        let (registry, _) = registries();
        let web = service("web-1", "web", 8080);
        registry.add_service(web.clone()).await;
        registry
            .add_service(
                Service::builder()
                    .with_name("printer")
                    .with_address(Ipv4Addr::new(10, 0, 0, 9))
                    .with_port(631)
                    .build()
                    .unwrap(),
            )
            .await;

        assert_eq!(
            registry.service_by_id(&ServiceId::new("web-1")).await,
            Some(web.clone())
        );
        assert!(registry.service_by_id(&ServiceId::new("nope")).await.is_none());
        assert_eq!(registry.services_by_name("web").await.len(), 1);
        assert_eq!(
            registry.services_by_ip(Ipv4Addr::new(10, 0, 0, 5)).await,
            vec![web]
        );
        assert_eq!(
            registry.services_from(DiscoverySource::Consul).await.len(),
            1
        );
        assert_eq!(
            registry.services_from(DiscoverySource::None).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_lookup_returns_none() {
        let (registry, _) = registries();
        registry.add_service(service("web-1", "web", 8080)).await;
        registry.add_service(service("web-1", "web", 9090)).await;

        assert!(registry.service_by_id(&ServiceId::new("web-1")).await.is_none());
    }
}
