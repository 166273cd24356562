// Portal - a bring-your-own-device service portal
//
// This library keeps a curated registry of backend services reachable by
// guest devices, synchronized against an external Consul catalog.

// Re-export the registries and data model
pub use portal_registry::*;

// Re-export the catalog reconciliation engine
pub use portal_consul::{
    CatalogClient, CatalogEntry, CatalogResolver, CatalogSnapshot, ConsulConfig,
    ConsulConfigBuilder, ConsulError, ConsulWatcher, ReconcilePlan, Reconciler, ServiceUpdate,
    DEFAULT_AGENT_PORT, MIN_TIMEOUT_MARGIN,
};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Connection,
        ConnectionRegistry,
        ConsulConfig,
        ConsulError,
        ConsulWatcher,
        DiscoverySource,
        Host,
        HostId,
        HostResolver,
        InMemoryHostResolver,
        Service,
        ServiceId,
        ServiceRegistry,
        Transport,
    };
}
