//! NDEx REST client: the catalog search used to build the manifest and the
//! raw network download used by transfers.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::domain::{NetworkDescriptor, NetworkId};
use crate::error::MirrorError;

/// Shape of `POST /search/network`. Fields NDEx sends beyond these are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSearchResponse {
    pub num_found: u64,
    #[serde(default)]
    pub networks: Vec<NetworkSummary>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    #[serde(default)]
    pub name: Option<String>,
    pub external_id: String,
    #[serde(default)]
    pub node_count: u64,
    #[serde(default)]
    pub edge_count: u64,
}

pub trait CatalogClient: Send + Sync {
    fn search_networks(&self) -> Result<NetworkSearchResponse, MirrorError>;
}

pub trait ContentFetcher: Send + Sync {
    /// Opens the raw content of a network. The body is returned unread.
    fn fetch(&self, id: &NetworkId) -> Result<Box<dyn Read + Send>, MirrorError>;
}

/// Runs the catalog search and maps every summary to a descriptor, keeping
/// search order.
///
/// Fails with [`MirrorError::ManifestCountMismatch`] when the reported total
/// differs from the number of summaries actually returned, which happens when
/// the catalog outgrows the result-size ceiling.
pub fn build_manifest<C: CatalogClient + ?Sized>(
    catalog: &C,
) -> Result<Vec<NetworkDescriptor>, MirrorError> {
    let response = catalog.search_networks()?;

    let actual = response.networks.len();
    if u64::try_from(actual).ok() != Some(response.num_found) {
        return Err(MirrorError::ManifestCountMismatch {
            reported: response.num_found,
            actual,
        });
    }
    tracing::info!(
        networks = response.num_found,
        "number of networks that will be written to the manifest"
    );

    response
        .networks
        .into_iter()
        .map(|summary| {
            Ok(NetworkDescriptor {
                id: summary.external_id.parse()?,
                name: summary.name.unwrap_or_default(),
                node_count: summary.node_count,
                edge_count: summary.edge_count,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct NdexHttpClient {
    client: Client,
    base_url: String,
    search_size: u64,
}

impl NdexHttpClient {
    pub fn new(config: &Config) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ndex-mirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::NdexHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(config.request_timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|err| MirrorError::NdexHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.ndex_base_url.trim_end_matches('/').to_string(),
            search_size: config.search_size,
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}/search/network", self.base_url)
    }

    pub fn network_url(&self, id: &NetworkId) -> String {
        format!("{}/network/{}", self.base_url, id.as_str())
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, MirrorError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "NDEx request failed".to_string());
        Err(MirrorError::NdexStatus { status, message })
    }
}

impl CatalogClient for NdexHttpClient {
    fn search_networks(&self) -> Result<NetworkSearchResponse, MirrorError> {
        let url = self.search_url();
        tracing::debug!(%url, size = self.search_size, "searching NDEx catalog");
        let response = self
            .client
            .post(&url)
            .query(&[("size", self.search_size)])
            .json(&json!({ "searchString": "" }))
            .send()
            .map_err(|err| MirrorError::NdexHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| MirrorError::NdexDecode(err.to_string()))
    }
}

impl ContentFetcher for NdexHttpClient {
    fn fetch(&self, id: &NetworkId) -> Result<Box<dyn Read + Send>, MirrorError> {
        let url = self.network_url(id);
        tracing::debug!(%url, "downloading network");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| MirrorError::NdexHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        Ok(Box::new(response))
    }
}
