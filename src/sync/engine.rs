//! Incremental sync decision
//!
//! The source timeline is replayed oldest to newest against what the
//! destination already holds. Three markers drive the scan:
//!
//! - `transferring`: sticky; once set, this and every later tag is copied
//! - `seen_sync_point`: a non-floating tag already present at the
//!   destination has been passed, so any later tag missing there is a gap
//! - `force_post_sync_point`: the destination's newest tag has been passed,
//!   so everything after it is newer than anything mirrored before
//!
//! A tag selected by the markers is still skipped when its digest is known on
//! both sides and matches.

use crate::registry::tags::{FLOATING_TAG, TagIndex, TagListing, TagRecord};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// What is known about the mirror target for one image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationState {
    pub ok: bool,
    pub index: TagIndex,
    pub last_tag: Option<String>,
    pub last_timestamp: Option<i64>,
}

impl DestinationState {
    pub fn new(listing: TagListing, last_tag: Option<String>, last_timestamp: Option<i64>) -> Self {
        Self {
            ok: listing.ok,
            index: listing.index,
            last_tag,
            last_timestamp,
        }
    }

    /// Nothing usable came back: the query failed and no anchor is known
    pub fn is_inconclusive(&self) -> bool {
        !self.ok && self.last_tag.is_none() && self.last_timestamp.is_none()
    }
}

impl From<TagListing> for DestinationState {
    fn from(listing: TagListing) -> Self {
        let (last_tag, last_timestamp) = listing.last_tag();
        Self::new(listing, last_tag, last_timestamp)
    }
}

/// Read-only view of the destination used while scanning
pub struct ScanContext<'a> {
    destination_tags: HashSet<&'a str>,
    destination_digests: HashMap<&'a str, &'a str>,
    last_tag: Option<&'a str>,
    last_timestamp: Option<i64>,
    cutoff_ms: Option<i64>,
}

impl<'a> ScanContext<'a> {
    pub fn new(destination: &'a DestinationState, cutoff_ms: i64) -> Self {
        let last_timestamp = destination
            .last_timestamp
            .filter(|_| destination.index.has_push_times());
        Self {
            destination_tags: destination.index.tags(),
            destination_digests: destination.index.digest_by_tag(),
            last_tag: destination.last_tag.as_deref(),
            last_timestamp,
            cutoff_ms: Some(cutoff_ms),
        }
    }

    /// Positional source times cannot be compared with the cutoff or the
    /// destination's push time; only tag presence and digests apply.
    pub fn for_source(mut self, source: &TagIndex) -> Self {
        if !source.has_push_times() {
            self.cutoff_ms = None;
            self.last_timestamp = None;
        }
        self
    }

    fn digest_matches(&self, record: &TagRecord) -> bool {
        match (record.digest.as_deref(), self.destination_digests.get(record.tag.as_str())) {
            (Some(source), Some(destination)) => source == *destination,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
    pub transferring: bool,
    pub seen_sync_point: bool,
    pub force_post_sync_point: bool,
}

impl ScanState {
    /// A destination without any tag has never been synced: everything goes.
    pub fn initial(never_synced: bool) -> Self {
        Self {
            transferring: never_synced,
            ..Self::default()
        }
    }

    /// Advance over one source tag. Returns the next state and whether the
    /// tag must be transferred.
    pub fn step(self, record: &TagRecord, ctx: &ScanContext<'_>) -> (Self, bool) {
        let mut next = self;
        let tag = record.tag.as_str();

        if ctx.cutoff_ms.is_none_or(|cutoff| record.pushed_at_ms > cutoff) {
            let at_destination = ctx.destination_tags.contains(tag);

            if !next.seen_sync_point && tag != FLOATING_TAG && at_destination {
                next.seen_sync_point = true;
            }
            if next.seen_sync_point && !at_destination {
                next.transferring = true;
            }
            if ctx
                .last_timestamp
                .is_some_and(|last| record.pushed_at_ms > last)
            {
                next.transferring = true;
            }
            if tag == FLOATING_TAG || next.force_post_sync_point {
                next.transferring = true;
            }
            if ctx.last_tag == Some(tag) {
                next.force_post_sync_point = true;
            }
        }

        if !next.transferring || ctx.digest_matches(record) {
            return (next, false);
        }
        (next, true)
    }
}

/// Per-image outcome of the decision step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDecision {
    pub destination_name: String,
    /// Every source tag, oldest first
    pub source_tags: Vec<String>,
    /// Tags to copy, oldest first
    pub tags_to_transfer: Vec<String>,
    /// The destination could not be read; nothing is copied this run
    pub deferred: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncEngine {
    cutoff_ms: i64,
}

impl SyncEngine {
    /// Tags pushed at or before `cutoff_ms` never move the markers.
    pub fn new(cutoff_ms: i64) -> Self {
        Self { cutoff_ms }
    }

    pub fn cutoff_ms(&self) -> i64 {
        self.cutoff_ms
    }

    pub fn decide(
        &self,
        destination_name: &str,
        source: &TagIndex,
        destination: &DestinationState,
    ) -> SyncDecision {
        let ascending = source.ascending();
        let source_tags: Vec<String> = ascending.iter().map(|r| r.tag.clone()).collect();

        if destination.is_inconclusive() {
            tracing::warn!(
                destination = destination_name,
                pending = source_tags.len(),
                "destination state unknown, deferring image"
            );
            return SyncDecision {
                destination_name: destination_name.to_string(),
                source_tags,
                tags_to_transfer: Vec::new(),
                deferred: true,
            };
        }

        let ctx = ScanContext::new(destination, self.cutoff_ms).for_source(source);
        let mut state = ScanState::initial(destination.last_tag.is_none());
        let mut tags_to_transfer = Vec::new();

        for record in &ascending {
            let (next, emit) = state.step(record, &ctx);
            tracing::trace!(
                tag = %record.tag,
                pushed_at = record.pushed_at_ms,
                transferring = next.transferring,
                seen_sync_point = next.seen_sync_point,
                force_post_sync_point = next.force_post_sync_point,
                emit,
                "scan step"
            );
            state = next;
            if emit {
                tags_to_transfer.push(record.tag.clone());
            }
        }

        tracing::debug!(
            destination = destination_name,
            source_tags = source_tags.len(),
            selected = tags_to_transfer.len(),
            "sync decision"
        );

        SyncDecision {
            destination_name: destination_name.to_string(),
            source_tags,
            tags_to_transfer,
            deferred: false,
        }
    }
}
