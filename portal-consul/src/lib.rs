//! Consul catalog reconciliation for the portal
//!
//! This crate keeps the portal's service registry synchronized with an
//! external Consul catalog.
//!
//! ## Features
//!
//! - **Catalog client** - Listing, per-name description, and index-keyed
//!   blocking queries against the agent's HTTP API
//! - **Entry resolution** - Catalog entries become portal services only when
//!   they map to exactly one known host
//! - **Reconciliation** - An idempotent, id-keyed diff that preserves live
//!   user connections across service updates
//! - **Background watcher** - A restartable long-poll loop with explicit
//!   connect/disconnect and graceful transport-failure recovery
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portal_consul::*;
//! use portal_registry::*;
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connections = Arc::new(ConnectionRegistry::new());
//!     let registry = Arc::new(ServiceRegistry::new(connections.clone()));
//!     let hosts = Arc::new(InMemoryHostResolver::new());
//!
//!     let watcher = ConsulWatcher::new(
//!         registry.clone(),
//!         connections,
//!         hosts,
//!         ConsulConfig::default(),
//!     );
//!
//!     // initial sync happens before connect returns; the background task
//!     // keeps the registry current until disconnect
//!     watcher.connect_default(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))).await?;
//!
//!     for service in registry.services().await {
//!         println!("offering {}", service);
//!     }
//!
//!     watcher.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod watcher;

pub use client::{CatalogClient, CatalogEntry, CatalogSnapshot};
pub use config::{ConsulConfig, ConsulConfigBuilder, DEFAULT_AGENT_PORT, MIN_TIMEOUT_MARGIN};
pub use error::{ConsulError, Result};
pub use reconcile::{ReconcilePlan, Reconciler, ServiceUpdate};
pub use resolver::CatalogResolver;
pub use watcher::ConsulWatcher;
