//! Consul catalog HTTP client

use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use tracing::debug;
use url::Url;

use crate::config::ConsulConfig;
use crate::error::{ConsulError, Result};

/// Name of the response header carrying the catalog version index.
const INDEX_HEADER: &str = "X-Consul-Index";

/// One catalog entry as returned by `/v1/catalog/service/{name}`
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    /// Catalog-assigned service id
    #[serde(rename = "ServiceID")]
    pub service_id: String,

    /// Registered service name
    #[serde(rename = "ServiceName")]
    pub service_name: String,

    /// Address of the node the service runs on
    #[serde(rename = "Address")]
    pub address: String,

    /// Service-level address override; empty when the node address applies
    #[serde(rename = "ServiceAddress", default)]
    pub service_address: String,

    /// Registered service port
    #[serde(rename = "ServicePort")]
    pub service_port: u16,

    /// Registered tags
    #[serde(rename = "ServiceTags", default)]
    pub service_tags: Vec<String>,
}

/// The catalog's service listing together with its version index
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Monotonic catalog version index taken from the `X-Consul-Index` header
    pub index: u64,
    /// Registered service names and their tags
    pub services: HashMap<String, Vec<String>>,
}

/// HTTP client for one Consul agent
///
/// The request timeout is derived from the configured wait bound plus the
/// timeout margin, so a blocking query always completes (or times out
/// server-side) before the transport gives up.
pub struct CatalogClient {
    base_url: Url,
    client: reqwest::Client,
    wait_secs: u64,
}

impl CatalogClient {
    /// Create a client for the agent at the given address.
    ///
    /// Fails on a rejected configuration, never performs I/O.
    pub fn new(address: IpAddr, port: u16, config: &ConsulConfig) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&format!("http://{}", SocketAddr::new(address, port)))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            base_url,
            client,
            wait_secs: config.wait.as_secs(),
        })
    }

    /// List the registered service names, returning immediately.
    pub async fn services(&self) -> Result<CatalogSnapshot> {
        self.catalog_services(None).await
    }

    /// List the registered service names, blocking server-side until the
    /// catalog index advances past `index` or the wait bound elapses.
    pub async fn services_blocking(&self, index: u64) -> Result<CatalogSnapshot> {
        self.catalog_services(Some(index)).await
    }

    async fn catalog_services(&self, index: Option<u64>) -> Result<CatalogSnapshot> {
        let mut url = self.endpoint(&["v1", "catalog", "services"])?;
        if let Some(index) = index {
            url.query_pairs_mut()
                .append_pair("index", &index.to_string())
                .append_pair("wait", &format!("{}s", self.wait_secs));
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ConsulError::UnexpectedStatus(response.status().as_u16()));
        }

        let index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        let services = response.json().await?;

        Ok(CatalogSnapshot { index, services })
    }

    /// Fetch the catalog entries registered under a service name.
    pub async fn service_entries(&self, name: &str) -> Result<Vec<CatalogEntry>> {
        let url = self.endpoint(&["v1", "catalog", "service", name])?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ConsulError::UnexpectedStatus(response.status().as_u16()));
        }

        let entries: Vec<CatalogEntry> = response.json().await?;
        debug!("catalog lists {} entries for service {}", entries.len(), name);
        Ok(entries)
    }

    /// Build an endpoint URL; segments are percent-encoded, so registered
    /// names with spaces or slashes stay a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ConsulError::InvalidConfiguration(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ConsulConfig {
        ConsulConfig::builder()
            .wait(Duration::from_secs(1))
            .request_timeout_margin(Duration::from_secs(3))
            .build()
    }

    fn client_for(server: &MockServer) -> CatalogClient {
        let addr = server.address();
        CatalogClient::new(addr.ip(), addr.port(), &test_config()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let config = ConsulConfig::builder()
            .request_timeout_margin(Duration::from_secs(1))
            .build();
        let result = CatalogClient::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8500, &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_encodes_service_names() {
        let client = CatalogClient::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            8500,
            &ConsulConfig::default(),
        )
        .unwrap();

        let url = client
            .endpoint(&["v1", "catalog", "service", "my web app"])
            .unwrap();
        assert_eq!(url.path(), "/v1/catalog/service/my%20web%20app");
    }

    #[tokio::test]
    async fn test_services_parses_index_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/catalog/services"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Consul-Index", "42")
                    .set_body_json(json!({"web": ["tag1"], "consul": []})),
            )
            .mount(&server)
            .await;

        let snapshot = client_for(&server).services().await.unwrap();
        assert_eq!(snapshot.index, 42);
        assert_eq!(snapshot.services.len(), 2);
        assert_eq!(snapshot.services["web"], vec!["tag1".to_string()]);
    }

    #[tokio::test]
    async fn test_blocking_query_sends_index_and_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/catalog/services"))
            .and(query_param("index", "42"))
            .and(query_param("wait", "1s"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Consul-Index", "43")
                    .set_body_json(json!({"web": ["tag1"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = client_for(&server).services_blocking(42).await.unwrap();
        assert_eq!(snapshot.index, 43);
    }

    #[tokio::test]
    async fn test_plain_listing_has_no_index_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/catalog/services"))
            .and(query_param_is_missing("index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = client_for(&server).services().await.unwrap();
        // no index header on the response defaults to zero
        assert_eq!(snapshot.index, 0);
    }

    #[tokio::test]
    async fn test_service_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/catalog/service/web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "ServiceID": "web-1",
                "ServiceName": "web",
                "Address": "10.0.0.5",
                "ServiceAddress": "",
                "ServicePort": 8080,
                "ServiceTags": ["tag1"]
            }])))
            .mount(&server)
            .await;

        let entries = client_for(&server).service_entries("web").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].service_id, "web-1");
        assert_eq!(entries[0].service_port, 8080);
        assert!(entries[0].service_address.is_empty());
    }

    #[tokio::test]
    async fn test_entries_without_optional_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/catalog/service/bare"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "ServiceID": "bare-1",
                "ServiceName": "bare",
                "Address": "10.0.0.6",
                "ServicePort": 9000
            }])))
            .mount(&server)
            .await;

        let entries = client_for(&server).service_entries("bare").await.unwrap();
        assert!(entries[0].service_address.is_empty());
        assert!(entries[0].service_tags.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/catalog/services"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server).services().await;
        assert!(matches!(result, Err(ConsulError::UnexpectedStatus(500))));
    }
}
