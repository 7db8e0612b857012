//! Google-style tag listing (`gcr.io`, `k8s.gcr.io`, Artifact Registry and
//! `registry.k8s.io`)
//!
//! These registries extend `/v2/{name}/tags/list` with a `manifest` map keyed
//! by digest that carries the tags and upload time of each manifest.

use crate::error::{MirrorError, Result};
use crate::registry::adapter::{ListingOutcome, TagIndexAdapter};
use crate::registry::client::RegistryHttp;
use crate::registry::tags::TagRecord;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct TagsList {
    /// `null` when the registry answers for a repository it cannot resolve.
    /// Kept as an ordered map so equal upload times stay in response order.
    manifest: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    #[serde(default)]
    tag: Vec<String>,
    #[serde(default)]
    time_uploaded_ms: Option<String>,
}

/// Registries reject anonymous list calls without a gcloud-like agent.
fn gcloud_user_agent() -> String {
    format!(
        "google-cloud-sdk //containerregistry/client:gcloud.py gcloud/313.0.1 \
         command/gcloud.container.images.list-tags invocation-id/{} \
         environment/None environment-version/None interactive/False from-script/False",
        uuid::Uuid::new_v4().simple()
    )
}

fn records_from_manifest_map(manifest: Map<String, Value>) -> Result<Vec<TagRecord>> {
    let mut records = Vec::new();
    for (digest, raw) in manifest {
        let entry: ManifestEntry = serde_json::from_value(raw)
            .map_err(|e| MirrorError::Parse(format!("manifest entry {}: {}", digest, e)))?;
        let uploaded = match entry.time_uploaded_ms.as_deref() {
            Some(raw) if !raw.is_empty() => raw.parse::<i64>().map_err(|e| {
                MirrorError::Parse(format!("timeUploadedMs {:?} of {}: {}", raw, digest, e))
            })?,
            _ => 0,
        };
        for tag in entry.tag {
            records.push(TagRecord::new(tag, uploaded, Some(digest.clone())));
        }
    }
    Ok(records)
}

#[derive(Clone)]
pub struct GoogleRegistryAdapter {
    http: RegistryHttp,
    base_url: String,
    kind: &'static str,
}

impl GoogleRegistryAdapter {
    /// `host` is the bare registry host, e.g. `gcr.io`
    pub fn new(http: RegistryHttp, host: &str) -> Self {
        Self::with_base_url(http, format!("https://{}", host))
    }

    pub fn with_base_url(http: RegistryHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            kind: "google",
        }
    }

    /// Same wire format, different label in logs
    pub fn kubernetes(mut self) -> Self {
        self.kind = "kubernetes";
        self
    }
}

#[async_trait]
impl TagIndexAdapter for GoogleRegistryAdapter {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn list_tags(&self, name: &str) -> Result<ListingOutcome> {
        let url = format!("{}/v2/{}/tags/list", self.base_url, name.trim_matches('/'));
        let user_agent = gcloud_user_agent();

        let listing: Option<TagsList> = self
            .http
            .get_json(&url, Some(&user_agent), "tag listing")
            .await?;

        match listing {
            None => Ok(ListingOutcome::NotFound),
            Some(TagsList { manifest: None }) => Err(MirrorError::Registry(format!(
                "{} returned no manifest map for {}",
                self.base_url, name
            ))),
            Some(TagsList {
                manifest: Some(manifest),
            }) => Ok(ListingOutcome::Found(records_from_manifest_map(manifest)?)),
        }
    }
}
