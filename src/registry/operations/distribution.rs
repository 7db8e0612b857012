//! Plain OCI distribution tag listing (`GET /v2/{name}/tags/list`)
//!
//! The distribution API exposes neither push times nor digests. Tags come
//! back as an untimed listing where later entries are treated as newer.

use crate::error::Result;
use crate::registry::adapter::{ListingOutcome, TagIndexAdapter};
use crate::registry::client::RegistryHttp;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct DistributionAdapter {
    http: RegistryHttp,
    address: String,
}

impl DistributionAdapter {
    /// `host` is the bare registry host, e.g. `ghcr.io`
    pub fn new(http: RegistryHttp, host: &str) -> Self {
        Self::with_base_url(http, format!("https://{}", host))
    }

    pub fn with_base_url(http: RegistryHttp, address: impl Into<String>) -> Self {
        Self {
            http,
            address: address.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TagIndexAdapter for DistributionAdapter {
    fn kind(&self) -> &'static str {
        "distribution"
    }

    /// List all tags in repository using Docker Registry v2 API
    async fn list_tags(&self, name: &str) -> Result<ListingOutcome> {
        let url = format!("{}/v2/{}/tags/list", self.address, name.trim_matches('/'));

        let response: Option<TagsResponse> =
            self.http.get_json(&url, None, "tag listing").await?;

        let Some(response) = response else {
            return Ok(ListingOutcome::NotFound);
        };

        Ok(ListingOutcome::Untimed(response.tags.unwrap_or_default()))
    }
}
