//! Service and connection registries for the portal
//!
//! This crate holds the portal's data model and the two synchronized stores
//! the rest of the system is built around.
//!
//! ## Features
//!
//! - **Service model** - Stable ids, value equality, discovery provenance
//! - **Service registry** - Uniqueness enforcement and cascading removal
//! - **Connection registry** - User-to-service associations with change listeners
//! - **Host lookup** - The resolver boundary to the topology subsystem
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portal_registry::*;
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connections = Arc::new(ConnectionRegistry::new());
//!     let registry = ServiceRegistry::new(connections.clone());
//!
//!     let printer = Service::builder()
//!         .with_name("printer")
//!         .with_address(Ipv4Addr::new(10, 0, 0, 9))
//!         .with_port(631)
//!         .build()?;
//!     registry.add_service(printer.clone()).await;
//!
//!     let user = Host::new("aa:bb:cc:dd:ee:01/None", [Ipv4Addr::new(10, 0, 1, 4)]);
//!     connections.add_connection(Connection::new(user, printer)).await;
//!
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod host;
pub mod registry;
pub mod service;

pub use connection::{Connection, ConnectionRegistry};
pub use host::{Host, HostId, HostResolver, InMemoryHostResolver};
pub use registry::ServiceRegistry;
pub use service::{
    DiscoverySource, Service, ServiceBuilder, ServiceError, ServiceId, Transport,
};
