//! Destination state reader with a short-lived listing cache
//!
//! The mirror target is usually the rate-limited side, so listings are kept
//! for a configurable TTL. Each name has its own async lock: concurrent
//! lookups of one name wait for a single fetch instead of issuing several.

use crate::registry::adapter::TagIndexAdapter;
use crate::registry::tags::{last_tag_of, TagIndex, TagListing};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// Default lifetime of a cached destination listing
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120);

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at_ms: i64,
    listing: TagListing,
}

type Slot = Arc<AsyncMutex<Option<CacheEntry>>>;

/// Per-name cache of destination listings
#[derive(Debug, Default)]
pub struct TagCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key: registry host prefix dropped, case folded
    pub fn normalize_key(name: &str) -> String {
        name.trim()
            .trim_start_matches("docker.io/")
            .trim_matches('/')
            .to_ascii_lowercase()
    }

    fn slot(&self, key: &str) -> Slot {
        // A poisoned map only means another worker panicked mid-insert; the
        // map itself is still usable.
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.entry(key.to_string()).or_default().clone()
    }

    pub fn len(&self) -> usize {
        match self.slots.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct DestinationReader {
    adapter: Arc<dyn TagIndexAdapter>,
    cache: TagCache,
    ttl: Duration,
}

impl DestinationReader {
    pub fn new(adapter: Arc<dyn TagIndexAdapter>) -> Self {
        Self {
            adapter,
            cache: TagCache::new(),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Tag listing for `name`, served from cache while fresh.
    pub async fn sorted_tags(&self, name: &str) -> TagListing {
        let key = TagCache::normalize_key(name);
        let slot = self.cache.slot(&key);
        let mut entry = slot.lock().await;

        let now = now_millis();
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if let Some(cached) = entry.as_ref() {
            if now.saturating_sub(cached.fetched_at_ms) < ttl_ms {
                tracing::debug!(name = %key, "destination listing served from cache");
                return cached.listing.clone();
            }
        }

        let listing = self.adapter.sorted_tags(&key).await;
        *entry = Some(CacheEntry {
            fetched_at_ms: now_millis(),
            listing: listing.clone(),
        });
        listing
    }

    /// Most recently pushed tag of `name`. A precomputed index skips the
    /// lookup entirely.
    pub async fn last_tag(
        &self,
        name: &str,
        precomputed: Option<&TagIndex>,
    ) -> (Option<String>, Option<i64>) {
        match precomputed {
            Some(index) => last_tag_of(index),
            None => self.sorted_tags(name).await.last_tag(),
        }
    }

    pub fn cached_names(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MirrorError, Result};
    use crate::registry::adapter::ListingOutcome;
    use crate::registry::tags::TagRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TagIndexAdapter for Counting {
        fn kind(&self) -> &'static str {
            "counting"
        }

        async fn list_tags(&self, _name: &str) -> Result<ListingOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail {
                return Err(MirrorError::RateLimited("429".into()));
            }
            Ok(ListingOutcome::Found(vec![
                TagRecord::new("v1", 100, Some("sha256:a".into())),
                TagRecord::new("v2", 200, None),
            ]))
        }
    }

    #[test]
    fn keys_are_normalized() {
        assert_eq!(TagCache::normalize_key("docker.io/GCMirrors/Pause"), "gcmirrors/pause");
        assert_eq!(TagCache::normalize_key("gcmirrors/pause/"), "gcmirrors/pause");
    }

    #[tokio::test]
    async fn hit_within_ttl_skips_network() {
        let adapter = Arc::new(Counting::default());
        let reader = DestinationReader::new(adapter.clone());

        let first = reader.sorted_tags("gcmirrors/pause").await;
        let second = reader.sorted_tags("docker.io/gcmirrors/pause").await;

        assert_eq!(first, second);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(reader.cached_names(), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let adapter = Arc::new(Counting::default());
        let reader = DestinationReader::new(adapter.clone()).with_ttl(Duration::ZERO);

        reader.sorted_tags("gcmirrors/pause").await;
        reader.sorted_tags("gcmirrors/pause").await;

        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_fetch() {
        let adapter = Arc::new(Counting::default());
        let reader = Arc::new(DestinationReader::new(adapter.clone()));

        let lookups = (0..8).map(|_| {
            let reader = reader.clone();
            async move { reader.sorted_tags("gcmirrors/etcd").await }
        });
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(|l| l.ok && l.index.len() == 2));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inconclusive_results_are_cached_too() {
        let adapter = Arc::new(Counting {
            fail: true,
            ..Default::default()
        });
        let reader = DestinationReader::new(adapter.clone());

        assert!(!reader.sorted_tags("gcmirrors/x").await.ok);
        assert!(!reader.sorted_tags("gcmirrors/x").await.ok);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_tag_prefers_precomputed_index() {
        let adapter = Arc::new(Counting::default());
        let reader = DestinationReader::new(adapter.clone());

        let index = TagIndex::from_records(vec![TagRecord::new("only", 7, None)]);
        assert_eq!(
            reader.last_tag("gcmirrors/x", Some(&index)).await,
            (Some("only".to_string()), Some(7))
        );
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);

        assert_eq!(
            reader.last_tag("gcmirrors/x", None).await,
            (Some("v2".to_string()), Some(200))
        );
        assert_eq!(
            reader.last_tag("gcmirrors/empty", Some(&TagIndex::default())).await,
            (None, None)
        );
    }
}
