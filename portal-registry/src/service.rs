//! Portal service model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;
use thiserror::Error;
use uuid::Uuid;

use crate::host::HostId;

/// Errors raised when building a service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service requires a name")]
    MissingName,

    #[error("service requires at least one IPv4 address")]
    MissingAddresses,

    #[error("service requires a transport port")]
    MissingPort,
}

/// Stable identifier of a logical service.
///
/// The id is assigned once at creation and survives value updates to the
/// same logical service; it is not part of value equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(String);

impl ServiceId {
    /// Create a service id from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a registry entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoverySource {
    /// Statically configured by an operator
    None,
    /// Synced from a Consul catalog
    Consul,
}

/// Transport protocol of a service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    #[default]
    Tcp,
    Udp,
}

const DEFAULT_ICON: &str = "list";

/// A backend service reachable through the portal
///
/// Two services are equal iff every attribute except `id` and the host
/// binding matches. Equality detects "no real change" during catalog
/// reconciliation; the id carries identity across updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    id: ServiceId,
    name: String,
    addresses: BTreeSet<Ipv4Addr>,
    port: u16,
    transport: Transport,
    source: DiscoverySource,
    icon: String,
    host: Option<HostId>,
}

impl Service {
    /// Create a new service builder
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::default()
    }

    /// The stable service identifier
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// The display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The IPv4 addresses the service is reachable on
    pub fn addresses(&self) -> &BTreeSet<Ipv4Addr> {
        &self.addresses
    }

    /// The transport protocol port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The transport protocol
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The discovery source this service was created by
    pub fn source(&self) -> DiscoverySource {
        self.source
    }

    /// The icon shown in the portal
    pub fn icon(&self) -> &str {
        &self.icon
    }

    /// The host the service was bound to at resolution time, if any
    pub fn host(&self) -> Option<&HostId> {
        self.host.as_ref()
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.addresses == other.addresses
            && self.port == other.port
            && self.transport == other.transport
            && self.source == other.source
            && self.icon == other.icon
    }
}

impl Eq for Service {}

impl Hash for Service {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.addresses.hash(state);
        self.port.hash(state);
        self.transport.hash(state);
        self.source.hash(state);
        self.icon.hash(state);
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Builder for [`Service`]
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    id: Option<ServiceId>,
    name: Option<String>,
    addresses: BTreeSet<Ipv4Addr>,
    port: Option<u16>,
    transport: Transport,
    source: Option<DiscoverySource>,
    icon: Option<String>,
    host: Option<HostId>,
}

impl ServiceBuilder {
    /// Set the service id. A fresh id is generated from the name if unset.
    pub fn with_id(mut self, id: ServiceId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a single IPv4 address
    pub fn with_address(mut self, address: Ipv4Addr) -> Self {
        self.addresses.insert(address);
        self
    }

    /// Add a set of IPv4 addresses
    pub fn with_addresses(mut self, addresses: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        self.addresses.extend(addresses);
        self
    }

    /// Set the transport protocol port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the transport protocol
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Set the discovery source
    pub fn with_source(mut self, source: DiscoverySource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the portal icon
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Bind the service to a resolved host
    pub fn with_host(mut self, host: HostId) -> Self {
        self.host = Some(host);
        self
    }

    /// Build the service
    pub fn build(self) -> Result<Service, ServiceError> {
        let name = self.name.ok_or(ServiceError::MissingName)?;
        if self.addresses.is_empty() {
            return Err(ServiceError::MissingAddresses);
        }
        let port = self.port.ok_or(ServiceError::MissingPort)?;

        let id = self
            .id
            .unwrap_or_else(|| ServiceId::new(format!("{}-{}", name, Uuid::new_v4())));

        Ok(Service {
            id,
            name,
            addresses: self.addresses,
            port,
            transport: self.transport,
            source: self.source.unwrap_or(DiscoverySource::None),
            icon: self.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            host: self.host,
        })
    }
}
