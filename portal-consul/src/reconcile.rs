//! Catalog-to-registry reconciliation
//!
//! The diff is computed as a pure plan, keyed solely on service ids, then
//! applied in a fixed order: removals, updates, additions. Running the same
//! fresh snapshot twice yields an empty second plan, so a spurious wakeup of
//! the watcher costs nothing.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use portal_registry::{
    Connection, ConnectionRegistry, DiscoverySource, Host, Service, ServiceId, ServiceRegistry,
};

/// A value change to an existing logical service
#[derive(Debug, Clone)]
pub struct ServiceUpdate {
    /// The registered service being superseded
    pub old: Service,
    /// The freshly resolved replacement, same id
    pub fresh: Service,
}

/// The minimal mutation set turning the registry's catalog-discovered
/// services into a fresh snapshot
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    /// Services whose catalog entry disappeared
    pub remove: Vec<Service>,
    /// Stale entries dropped because the catalog carries their id twice
    pub corrupt: Vec<Service>,
    /// Services whose value changed under a stable id
    pub update: Vec<ServiceUpdate>,
    /// Newly discovered services
    pub add: Vec<Service>,
    /// Services left untouched (old and fresh value-equal)
    pub kept: usize,
}

impl ReconcilePlan {
    /// Diff a fresh catalog snapshot against the currently registered
    /// catalog-discovered services, matching on [`ServiceId`] only.
    pub fn compute(fresh: Vec<Service>, current: Vec<Service>) -> Self {
        let mut by_id: HashMap<ServiceId, Vec<Service>> = HashMap::new();
        for service in fresh {
            by_id.entry(service.id().clone()).or_default().push(service);
        }

        let mut plan = Self::default();
        for old in current {
            match by_id.remove(old.id()) {
                None => {
                    debug!("service with id {} has been deleted from the catalog", old.id());
                    plan.remove.push(old);
                }
                Some(mut matches) if matches.len() == 1 => {
                    if let Some(fresh) = matches.pop() {
                        if old == fresh {
                            plan.kept += 1;
                        } else {
                            plan.update.push(ServiceUpdate { old, fresh });
                        }
                    }
                }
                Some(_) => {
                    warn!(
                        "more than one catalog entry with service id {}; removing stale service",
                        old.id()
                    );
                    plan.corrupt.push(old);
                }
            }
        }

        // everything not consumed by the match above is newly discovered
        plan.add.extend(by_id.into_values().flatten());
        plan.add.sort_by(|a, b| a.id().cmp(b.id()));
        plan
    }

    /// Whether applying this plan would mutate nothing
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty()
            && self.corrupt.is_empty()
            && self.update.is_empty()
            && self.add.is_empty()
    }
}

/// Applies reconcile plans to the registries
pub struct Reconciler {
    registry: Arc<ServiceRegistry>,
    connections: Arc<ConnectionRegistry>,
}

impl Reconciler {
    /// Create a reconciler over the given registries
    pub fn new(registry: Arc<ServiceRegistry>, connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            connections,
        }
    }

    /// Diff the fresh snapshot against the registry and apply the result.
    ///
    /// Only `Consul`-sourced services take part; statically configured
    /// services are never touched. Returns the applied plan.
    pub async fn reconcile(&self, fresh: Vec<Service>) -> ReconcilePlan {
        let current = self.registry.services_from(DiscoverySource::Consul).await;
        let plan = ReconcilePlan::compute(fresh, current);
        self.apply(&plan).await;
        plan
    }

    /// Apply a plan: removals first, then updates, then additions.
    pub async fn apply(&self, plan: &ReconcilePlan) {
        for service in plan.remove.iter().chain(&plan.corrupt) {
            self.registry.remove_service(service).await;
        }

        for update in &plan.update {
            // carry every connected user over to the replacement service
            let users: Vec<Host> = self
                .connections
                .connections_for_service(&update.old)
                .await
                .into_iter()
                .map(|connection| connection.user().clone())
                .collect();

            self.registry.remove_service(&update.old).await;
            self.registry.add_service(update.fresh.clone()).await;
            for user in &users {
                self.connections
                    .add_connection(Connection::new(user.clone(), update.fresh.clone()))
                    .await;
            }

            info!(
                "updated service {} and reconnected {} hosts",
                update.fresh,
                users.len()
            );
        }

        for service in &plan.add {
            self.registry.add_service(service.clone()).await;
        }
        if !plan.add.is_empty() {
            info!("added {} newly discovered services", plan.add.len());
        }
    }
}
