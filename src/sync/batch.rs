//! Time-of-day batching of large catalogs
//!
//! Rate-limited destinations cannot absorb a full pass over a large catalog
//! every run. The day is split into `batch_count` equal slots and each run
//! only handles the slice of the catalog belonging to the current slot.

use crate::error::{MirrorError, Result};
use chrono::Timelike;
use serde::{Deserialize, Serialize};

/// Catalogs up to this size are always processed in full
pub const BATCH_THRESHOLD: usize = 180;

pub const HOURS_PER_DAY: usize = 24;

/// Half-open slice `[start_index, end_index)` of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWindow {
    pub start_index: usize,
    pub end_index: usize,
    pub batch_number: usize,
}

impl BatchWindow {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = self.end_index.min(items.len());
        let start = self.start_index.min(end);
        &items[start..end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPartitioner {
    batch_count: usize,
    threshold: usize,
}

impl BatchPartitioner {
    pub fn new(batch_count: usize) -> Result<Self> {
        if batch_count == 0 || batch_count > HOURS_PER_DAY {
            return Err(MirrorError::Config(format!(
                "Batch count must be between 1 and {}, got {}",
                HOURS_PER_DAY, batch_count
            )));
        }
        Ok(Self {
            batch_count,
            threshold: BATCH_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    /// Slot of the day `hour` falls into: `floor(hour / (24 / batch_count))`
    pub fn batch_number(&self, hour: u32) -> usize {
        let hour = hour as usize % HOURS_PER_DAY;
        hour * self.batch_count / HOURS_PER_DAY
    }

    pub fn per_batch(&self, total: usize) -> usize {
        total / self.batch_count + 1
    }

    pub fn window_for(&self, total: usize, batch_number: usize) -> BatchWindow {
        let per_batch = self.per_batch(total);
        let start_index = (batch_number * per_batch).min(total);
        let end_index = ((batch_number + 1) * per_batch).min(total);
        BatchWindow {
            start_index,
            end_index,
            batch_number,
        }
    }

    /// Every window of one day, in batch order
    pub fn windows(&self, total: usize) -> Vec<BatchWindow> {
        (0..self.batch_count)
            .map(|batch| self.window_for(total, batch))
            .collect()
    }

    /// Window to process at `hour`, or `None` when the whole catalog is due
    pub fn select(&self, total: usize, rate_limited: bool, hour: u32) -> Option<BatchWindow> {
        if !rate_limited || total <= self.threshold {
            return None;
        }
        let window = self.window_for(total, self.batch_number(hour));
        tracing::info!(
            start_index = window.start_index,
            end_index = window.end_index,
            batch_number = window.batch_number,
            batch_count = self.batch_count,
            per_batch = self.per_batch(total),
            "catalog batch selected"
        );
        Some(window)
    }
}

/// Local hour of day used to pick the batch
pub fn current_hour() -> u32 {
    chrono::Local::now().hour()
}
