//! Normalized tag records and time-ordered tag indexes

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Tag that always floats to the newest build and is re-checked every run
pub const FLOATING_TAG: &str = "latest";

/// Signature, attestation and SBOM artifacts published next to real tags
/// (`sha256-<hex>.sig`, `.att`, `.sbom`)
const PSEUDO_TAG_PREFIX: &str = "sha256-";
const PSEUDO_TAG_SUFFIXES: [&str; 3] = [".sig", ".att", ".sbom"];

/// Whether a tag name is a supply-chain artifact rather than an image tag
pub fn is_pseudo_tag(tag: &str) -> bool {
    tag.starts_with(PSEUDO_TAG_PREFIX) && PSEUDO_TAG_SUFFIXES.iter().any(|s| tag.ends_with(s))
}

/// One tag of one image in one registry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag: String,
    pub pushed_at_ms: i64,
    pub digest: Option<String>,
}

impl TagRecord {
    pub fn new(tag: impl Into<String>, pushed_at_ms: i64, digest: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            pushed_at_ms,
            digest,
        }
    }
}

/// Tags of one image, newest first, without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndex {
    records: Vec<TagRecord>,
    /// Push times are listing positions, not epoch milliseconds
    #[serde(default)]
    positional: bool,
}

impl TagIndex {
    /// Build the canonical index from records in discovery order: pseudo tags
    /// are dropped, the first occurrence of a tag wins, and the result is
    /// sorted by push time descending with ties kept in discovery order.
    pub fn from_records(records: impl IntoIterator<Item = TagRecord>) -> Self {
        let mut seen = HashSet::new();
        let mut records: Vec<TagRecord> = records
            .into_iter()
            .filter(|r| !is_pseudo_tag(&r.tag))
            .filter(|r| seen.insert(r.tag.clone()))
            .collect();
        records.sort_by(|a, b| b.pushed_at_ms.cmp(&a.pushed_at_ms));
        Self {
            records,
            positional: false,
        }
    }

    /// Build an index for a registry that only lists tag names, oldest
    /// first. The position stands in for the push time, so the order is
    /// usable but the times must never be compared with real timestamps.
    pub fn from_listing_order(tags: impl IntoIterator<Item = String>) -> Self {
        let records = tags
            .into_iter()
            .enumerate()
            .map(|(position, tag)| TagRecord::new(tag, position as i64, None));
        Self {
            positional: true,
            ..Self::from_records(records)
        }
    }

    /// Whether `pushed_at_ms` holds real epoch milliseconds
    pub fn has_push_times(&self) -> bool {
        !self.positional
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Newest first
    pub fn records(&self) -> &[TagRecord] {
        &self.records
    }

    /// Oldest first, the order in which history is replayed
    pub fn ascending(&self) -> Vec<TagRecord> {
        self.records.iter().rev().cloned().collect()
    }

    pub fn newest(&self) -> Option<&TagRecord> {
        self.records.first()
    }

    pub fn get(&self, tag: &str) -> Option<&TagRecord> {
        self.records.iter().find(|r| r.tag == tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    pub fn tags(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.tag.as_str()).collect()
    }

    pub fn digest_by_tag(&self) -> HashMap<&str, &str> {
        self.records
            .iter()
            .filter_map(|r| r.digest.as_deref().map(|d| (r.tag.as_str(), d)))
            .collect()
    }
}

/// Result of asking one registry for the tags of one image.
///
/// `ok == false` means the registry could not be queried; the index is then
/// empty and must not be read as "the image has no tags".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagListing {
    pub ok: bool,
    pub index: TagIndex,
}

impl TagListing {
    pub fn found(index: TagIndex) -> Self {
        Self { ok: true, index }
    }

    pub fn confirmed_empty() -> Self {
        Self {
            ok: true,
            index: TagIndex::default(),
        }
    }

    pub fn inconclusive() -> Self {
        Self {
            ok: false,
            index: TagIndex::default(),
        }
    }

    /// Most recently pushed tag and its push time, if any
    pub fn last_tag(&self) -> (Option<String>, Option<i64>) {
        last_tag_of(&self.index)
    }
}

/// Newest tag and, when the index carries real push times, its timestamp
pub(crate) fn last_tag_of(index: &TagIndex) -> (Option<String>, Option<i64>) {
    match index.newest() {
        Some(record) => (
            Some(record.tag.clone()),
            index.has_push_times().then_some(record.pushed_at_ms),
        ),
        None => (None, None),
    }
}
