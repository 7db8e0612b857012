//! Quay tag listing through the Quay application API, which reports push
//! times (`start_ts`) and manifest digests per tag.

use crate::error::{MirrorError, Result};
use crate::registry::adapter::{ListingOutcome, TagIndexAdapter};
use crate::registry::client::RegistryHttp;
use crate::registry::tags::TagRecord;
use async_trait::async_trait;
use serde::Deserialize;

pub const QUAY_API: &str = "https://quay.io";

const PAGE_LIMIT: usize = 100;
const MAX_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct TagPage {
    #[serde(default)]
    tags: Vec<QuayTag>,
    #[serde(default)]
    has_additional: bool,
}

#[derive(Debug, Deserialize)]
struct QuayTag {
    name: String,
    /// Seconds since epoch
    start_ts: Option<i64>,
    manifest_digest: Option<String>,
}

#[derive(Clone)]
pub struct QuayAdapter {
    http: RegistryHttp,
    base_url: String,
}

impl QuayAdapter {
    pub fn new(http: RegistryHttp) -> Self {
        Self::with_base_url(http, QUAY_API)
    }

    pub fn with_base_url(http: RegistryHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TagIndexAdapter for QuayAdapter {
    fn kind(&self) -> &'static str {
        "quay"
    }

    async fn list_tags(&self, name: &str) -> Result<ListingOutcome> {
        let repository = name.trim_matches('/');
        let mut records = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = format!(
                "{}/api/v1/repository/{}/tag/?onlyActiveTags=true&limit={}&page={}",
                self.base_url, repository, PAGE_LIMIT, page
            );
            let body: Option<TagPage> = self.http.get_json(&url, None, "tag listing").await?;
            let Some(body) = body else {
                if page == 1 {
                    return Ok(ListingOutcome::NotFound);
                }
                return Err(MirrorError::Registry(format!(
                    "page {} of {} vanished while paginating",
                    page, repository
                )));
            };

            records.extend(body.tags.into_iter().map(|t| {
                TagRecord::new(
                    t.name,
                    t.start_ts.unwrap_or_default().saturating_mul(1000),
                    t.manifest_digest,
                )
            }));

            if !body.has_additional {
                return Ok(ListingOutcome::Found(records));
            }
        }

        tracing::warn!(repository, pages = MAX_PAGES, "tag listing truncated");
        Ok(ListingOutcome::Found(records))
    }
}
