//! Common contract of the per-registry tag listing adapters
//!
//! Each registry kind only has to turn its raw listing into [`TagRecord`]s in
//! discovery order; normalization into a [`TagIndex`] and the failure policy
//! live here so that every adapter behaves the same way.

use crate::error::Result;
use crate::registry::tags::{TagIndex, TagListing, TagRecord};
use async_trait::async_trait;

/// Raw outcome of one tag listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// The image exists; records are in discovery order
    Found(Vec<TagRecord>),
    /// Tag names only, oldest first; the registry exposes no push times
    Untimed(Vec<String>),
    /// The registry affirmatively reports that the image does not exist
    NotFound,
}

#[async_trait]
pub trait TagIndexAdapter: Send + Sync {
    /// Short label used in logs, e.g. `docker-hub`
    fn kind(&self) -> &'static str;

    /// Fetch the raw listing for `name` (the path inside the registry).
    /// Any `Err` is treated as inconclusive.
    async fn list_tags(&self, name: &str) -> Result<ListingOutcome>;

    /// Normalized, time-ordered tag index for `name`.
    async fn sorted_tags(&self, name: &str) -> TagListing {
        match self.list_tags(name).await {
            Ok(ListingOutcome::Found(records)) => {
                let index = TagIndex::from_records(records);
                tracing::debug!(registry = self.kind(), name, tags = index.len(), "tag index built");
                TagListing::found(index)
            }
            Ok(ListingOutcome::Untimed(tags)) => {
                let index = TagIndex::from_listing_order(tags);
                tracing::debug!(registry = self.kind(), name, tags = index.len(), "untimed tag index built");
                TagListing::found(index)
            }
            Ok(ListingOutcome::NotFound) => {
                tracing::debug!(registry = self.kind(), name, "image does not exist");
                TagListing::confirmed_empty()
            }
            Err(e) if !e.is_inconclusive() => {
                tracing::debug!(registry = self.kind(), name, error = %e, "image does not exist");
                TagListing::confirmed_empty()
            }
            Err(e) => {
                tracing::warn!(registry = self.kind(), name, error = %e, "tag listing inconclusive");
                TagListing::inconclusive()
            }
        }
    }
}
