//! Background catalog watcher
//!
//! One watcher owns at most one Consul session at a time. A session is a
//! fresh cancellation token plus a polling task driving the catalog's
//! blocking query; connect and disconnect tear sessions down and build them
//! up again, so the watcher is re-entrant across its whole lifetime.
//!
//! Every registry mutation batch (the connect-time swap, the disconnect
//! purge, and each reconcile apply) runs while the session lock is held.
//! Cancellation is only honored at loop boundaries: a batch that has started
//! always runs to completion, and a cancel observed after the lock is taken
//! aborts the batch before it touches the registry.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use portal_registry::{
    ConnectionRegistry, DiscoverySource, HostResolver, Service, ServiceRegistry,
};

use crate::client::{CatalogClient, CatalogEntry, CatalogSnapshot};
use crate::config::{ConsulConfig, DEFAULT_AGENT_PORT};
use crate::error::Result;
use crate::reconcile::Reconciler;
use crate::resolver::CatalogResolver;

/// Watches a Consul catalog and keeps the service registry in sync
pub struct ConsulWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    registry: Arc<ServiceRegistry>,
    resolver: CatalogResolver,
    reconciler: Reconciler,
    config: ConsulConfig,
    session: Mutex<Option<Session>>,
}

struct Session {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsulWatcher {
    /// Create a watcher over the given registries and host lookup
    pub fn new(
        registry: Arc<ServiceRegistry>,
        connections: Arc<ConnectionRegistry>,
        hosts: Arc<dyn HostResolver>,
        config: ConsulConfig,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                resolver: CatalogResolver::new(hosts),
                reconciler: Reconciler::new(registry.clone(), connections),
                registry,
                config,
                session: Mutex::new(None),
            }),
        }
    }

    /// Connect to the agent on the default Consul port
    pub async fn connect_default(&self, address: IpAddr) -> Result<()> {
        self.connect(address, DEFAULT_AGENT_PORT).await
    }

    /// Connect to a running Consul agent and start watching its catalog.
    ///
    /// Reachability is probed with one non-blocking listing before anything
    /// is mutated; a failed probe leaves the registry untouched. On success
    /// any stale catalog-discovered services are replaced by the agent's
    /// current catalog and the polling task is started.
    pub async fn connect(&self, address: IpAddr, port: u16) -> Result<()> {
        let client = Arc::new(CatalogClient::new(address, port, &self.inner.config)?);
        let snapshot = match client.services().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("no connection to consul agent at {}:{} possible", address, port);
                return Err(e);
            }
        };

        let mut session = self.inner.session.lock().await;
        if let Some(old) = session.take() {
            // the old polling task exits at its next cancellation check
            old.cancel.cancel();
            info!("replacing consul session {}", old.addr);
        }
        purge_catalog_services(&self.inner).await;

        let entries = fetch_entries(&client, &snapshot).await?;
        for service in self.inner.resolver.resolve(entries).await {
            self.inner.registry.add_service(service).await;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_catalog(
            self.inner.clone(),
            client,
            cancel.clone(),
        ));

        let addr = SocketAddr::new(address, port);
        *session = Some(Session { addr, cancel, task });
        info!("connected to consul agent at {}", addr);
        Ok(())
    }

    /// Stop watching and remove every catalog-discovered service.
    ///
    /// A no-op when no session is active.
    pub async fn disconnect(&self) {
        let mut session = self.inner.session.lock().await;
        let Some(old) = session.take() else {
            debug!("disconnect requested but no consul session is active");
            return;
        };

        old.cancel.cancel();
        purge_catalog_services(&self.inner).await;
        drop(session);

        // the task exits at its next cancellation check; a panic inside it
        // must not take the caller down
        if let Err(e) = old.task.await {
            if e.is_panic() {
                warn!("consul polling task panicked: {}", e);
            }
        }
        info!("disconnected from consul agent at {}", old.addr);
    }

    /// Whether a catalog session is currently active
    pub async fn is_connected(&self) -> bool {
        self.inner.session.lock().await.is_some()
    }

    /// The agent address of the active session, if any
    pub async fn agent_addr(&self) -> Option<SocketAddr> {
        self.inner.session.lock().await.as_ref().map(|s| s.addr)
    }
}

/// Remove every catalog-discovered service from the registry, cascading
/// connection removal. Callers hold the session lock.
async fn purge_catalog_services(inner: &WatcherInner) {
    for service in inner.registry.services_from(DiscoverySource::Consul).await {
        inner.registry.remove_service(&service).await;
    }
}

/// Describe every listed service name and collect the raw entries.
async fn fetch_entries(
    client: &CatalogClient,
    snapshot: &CatalogSnapshot,
) -> Result<Vec<CatalogEntry>> {
    let mut entries = Vec::new();
    for (name, tags) in &snapshot.services {
        debug!("found consul service [{} : {:?}]", name, tags);
        entries.extend(client.service_entries(name).await?);
    }
    Ok(entries)
}

/// One full fetch-and-resolve cycle: wait for the catalog index to move,
/// then describe and resolve the resulting listing. No registry access.
async fn poll_once(inner: &WatcherInner, client: &CatalogClient) -> Result<Vec<Service>> {
    let snapshot = client.services().await?;
    let snapshot = client.services_blocking(snapshot.index).await?;
    let entries = fetch_entries(client, &snapshot).await?;
    Ok(inner.resolver.resolve(entries).await)
}

/// The per-session polling loop.
async fn poll_catalog(
    inner: Arc<WatcherInner>,
    client: Arc<CatalogClient>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let fresh = tokio::select! {
            _ = cancel.cancelled() => break,
            result = poll_once(&inner, &client) => match result {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(
                        "transport failure while polling consul: {}; check that the \
                         agent is running and reconnect",
                        e
                    );
                    teardown_after_failure(&inner, &cancel).await;
                    break;
                }
            },
        };

        let guard = inner.session.lock().await;
        // a disconnect that won the lock first has already cleaned up
        if cancel.is_cancelled() {
            break;
        }
        let plan = inner.reconciler.reconcile(fresh).await;
        if plan.is_empty() {
            debug!("consul catalog unchanged");
        }
        drop(guard);
    }
}

/// Implicit disconnect after a transport failure: purge catalog services and
/// drop the session so the caller has to reconnect explicitly.
async fn teardown_after_failure(inner: &WatcherInner, cancel: &CancellationToken) {
    let mut session = inner.session.lock().await;
    if cancel.is_cancelled() {
        // an explicit disconnect or a reconnect got here first
        return;
    }
    cancel.cancel();
    purge_catalog_services(inner).await;
    *session = None;
}
