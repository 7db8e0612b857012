//! Docker Hub tag listing
//!
//! Uses the Hub repositories API (`/v2/repositories/{name}/tags`), which,
//! unlike the distribution API, reports push times and per-platform digests.

use crate::error::{MirrorError, Result};
use crate::registry::adapter::{ListingOutcome, TagIndexAdapter};
use crate::registry::client::RegistryHttp;
use crate::registry::tags::TagRecord;
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;

pub const DOCKER_HUB_API: &str = "https://hub.docker.com";

const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct TagPage {
    next: Option<String>,
    #[serde(default)]
    results: Vec<HubTag>,
}

#[derive(Debug, Deserialize)]
struct HubTag {
    name: String,
    tag_last_pushed: Option<String>,
    last_updated: Option<String>,
    digest: Option<String>,
    #[serde(default)]
    images: Vec<HubImage>,
}

#[derive(Debug, Deserialize)]
struct HubImage {
    digest: Option<String>,
}

impl HubTag {
    /// The tag's own digest, else the digest of the first listed platform
    /// manifest
    fn resolved_digest(&self) -> Option<String> {
        self.digest
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| self.images.first().and_then(|i| i.digest.clone()))
    }

    fn pushed_at_ms(&self) -> Result<i64> {
        match self.tag_last_pushed.as_deref().or(self.last_updated.as_deref()) {
            Some(raw) => parse_hub_timestamp(raw),
            None => Ok(0),
        }
    }

    fn into_record(self) -> Result<TagRecord> {
        let pushed_at_ms = self.pushed_at_ms()?;
        let digest = self.resolved_digest();
        Ok(TagRecord::new(self.name, pushed_at_ms, digest))
    }
}

/// `2020-07-16T07:29:28.81499Z` → epoch milliseconds
pub fn parse_hub_timestamp(raw: &str) -> Result<i64> {
    Ok(DateTime::parse_from_rfc3339(raw)?.timestamp_millis())
}

/// Hub names official images under `library/`
pub fn hub_repository_name(name: &str) -> String {
    let name = name
        .trim_start_matches("docker.io/")
        .trim_start_matches("registry.hub.docker.com/")
        .trim_matches('/');
    if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{}", name)
    }
}

#[derive(Clone)]
pub struct DockerHubAdapter {
    http: RegistryHttp,
    base_url: String,
}

impl DockerHubAdapter {
    pub fn new(http: RegistryHttp) -> Self {
        Self::with_base_url(http, DOCKER_HUB_API)
    }

    pub fn with_base_url(http: RegistryHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TagIndexAdapter for DockerHubAdapter {
    fn kind(&self) -> &'static str {
        "docker-hub"
    }

    async fn list_tags(&self, name: &str) -> Result<ListingOutcome> {
        let repository = hub_repository_name(name);
        let mut url = format!(
            "{}/v2/repositories/{}/tags?page_size={}",
            self.base_url, repository, PAGE_SIZE
        );
        let mut records = Vec::new();

        for page_number in 1..=MAX_PAGES {
            let page: Option<TagPage> = self.http.get_json(&url, None, "tag listing").await?;
            let Some(page) = page else {
                if page_number == 1 {
                    return Ok(ListingOutcome::NotFound);
                }
                return Err(MirrorError::Registry(format!(
                    "page {} of {} vanished while paginating",
                    page_number, repository
                )));
            };

            for tag in page.results {
                records.push(tag.into_record()?);
            }

            match page.next {
                Some(next) if !next.is_empty() => url = next,
                _ => return Ok(ListingOutcome::Found(records)),
            }
        }

        tracing::warn!(repository, pages = MAX_PAGES, "tag listing truncated");
        Ok(ListingOutcome::Found(records))
    }
}
