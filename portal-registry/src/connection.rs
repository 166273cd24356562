//! User-to-service connections
//!
//! A connection associates exactly one host (the user device) with exactly
//! one service. The registry is the source of truth the flow-programming
//! layer re-resolves from; listeners fire after every successful mutation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::host::{Host, HostId};
use crate::service::Service;

/// An association between a user host and a service
///
/// Connections have no identity beyond the pair; equality is pairwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    user: Host,
    service: Service,
}

impl Connection {
    /// Create a connection between a user host and a service
    pub fn new(user: Host, service: Service) -> Self {
        Self { user, service }
    }

    /// The user host
    pub fn user(&self) -> &Host {
        &self.user
    }

    /// The connected service
    pub fn service(&self) -> &Service {
        &self.service
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.user.id, self.service)
    }
}

type ChangeListener = Box<dyn Fn(&str) + Send + Sync>;

/// Registry of user-to-service connections
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<Vec<Connection>>>,
    listeners: Arc<RwLock<Vec<ChangeListener>>>,
}

impl ConnectionRegistry {
    /// Create an empty connection registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `false` without mutating when the pair
    /// is already registered.
    pub async fn add_connection(&self, connection: Connection) -> bool {
        let mut connections = self.connections.write().await;
        if connections.contains(&connection) {
            debug!("connection {} already registered", connection);
            return false;
        }

        debug!("added connection {}", connection);
        let service_name = connection.service.name().to_string();
        connections.push(connection);
        drop(connections);

        self.notify_listeners(&service_name).await;
        true
    }

    /// Remove a connection. Returns `false` when the pair is not registered.
    pub async fn remove_connection(&self, connection: &Connection) -> bool {
        let mut connections = self.connections.write().await;
        let Some(position) = connections.iter().position(|c| c == connection) else {
            return false;
        };

        connections.remove(position);
        debug!("removed connection {}", connection);
        drop(connections);

        self.notify_listeners(connection.service.name()).await;
        true
    }

    /// All registered connections
    pub async fn connections(&self) -> Vec<Connection> {
        self.connections.read().await.clone()
    }

    /// Connections referencing the given service
    pub async fn connections_for_service(&self, service: &Service) -> Vec<Connection> {
        let connections = self.connections.read().await;
        connections
            .iter()
            .filter(|c| c.service == *service)
            .cloned()
            .collect()
    }

    /// Connections held by the given host
    pub async fn connections_for_host(&self, host: &HostId) -> Vec<Connection> {
        let connections = self.connections.read().await;
        connections
            .iter()
            .filter(|c| c.user.id == *host)
            .cloned()
            .collect()
    }

    /// Register a change listener, called with the affected service name
    /// after each successful mutation
    pub async fn on_change<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().await;
        listeners.push(Box::new(callback));
    }

    async fn notify_listeners(&self, service_name: &str) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener(service_name);
        }
    }
}
