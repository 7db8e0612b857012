//! Per-image results and the run report

use crate::error::Result;
use crate::image::ImageReference;
use crate::sync::batch::BatchWindow;
use crate::sync::engine::SyncDecision;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ImageStatus {
    /// At least one tag was copied
    Synced,
    /// Nothing needed copying
    UpToDate,
    /// Destination could not be read, nothing was attempted
    Deferred,
    Failed(String),
}

impl ImageStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ImageStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFailure {
    pub tag: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReport {
    pub source: String,
    pub destination_name: String,
    /// All source tags, oldest first
    pub tags: Vec<String>,
    pub tag_count: usize,
    pub transferred: Vec<String>,
    pub failed: Vec<TagFailure>,
    pub status: ImageStatus,
    pub timestamp: String,
}

impl ImageReport {
    pub fn from_decision(
        source: &ImageReference,
        decision: SyncDecision,
        transferred: Vec<String>,
        failed: Vec<TagFailure>,
    ) -> Self {
        let status = if decision.deferred {
            ImageStatus::Deferred
        } else if !failed.is_empty() {
            ImageStatus::Failed(format!(
                "{} of {} transfers failed",
                failed.len(),
                failed.len() + transferred.len()
            ))
        } else if transferred.is_empty() {
            ImageStatus::UpToDate
        } else {
            ImageStatus::Synced
        };

        Self {
            source: source.to_string(),
            destination_name: decision.destination_name,
            tag_count: decision.source_tags.len(),
            tags: decision.source_tags,
            transferred,
            failed,
            status,
            timestamp: now_timestamp(),
        }
    }

    /// Entry for an image whose worker could not produce a decision
    pub fn failed(source: &ImageReference, destination_name: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            destination_name: destination_name.to_string(),
            tags: Vec::new(),
            tag_count: 0,
            transferred: Vec::new(),
            failed: Vec::new(),
            status: ImageStatus::Failed(message.into()),
            timestamp: now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub batch: Option<BatchWindow>,
    pub images: Vec<ImageReport>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl RunReport {
    pub fn new(batch: Option<BatchWindow>) -> Self {
        Self {
            batch,
            images: Vec::new(),
            started_at: now_timestamp(),
            finished_at: None,
        }
    }

    pub fn finish(mut self, images: Vec<ImageReport>) -> Self {
        self.images = images;
        self.finished_at = Some(now_timestamp());
        self
    }

    pub fn total_images(&self) -> usize {
        self.images.len()
    }

    pub fn total_transferred(&self) -> usize {
        self.images.iter().map(|i| i.transferred.len()).sum()
    }

    pub fn total_failed_tags(&self) -> usize {
        self.images.iter().map(|i| i.failed.len()).sum()
    }

    pub fn count_status(&self, predicate: impl Fn(&ImageStatus) -> bool) -> usize {
        self.images.iter().filter(|i| predicate(&i.status)).count()
    }

    pub fn failed_images(&self) -> usize {
        self.count_status(ImageStatus::is_failed)
    }

    pub fn deferred_images(&self) -> usize {
        self.count_status(|s| *s == ImageStatus::Deferred)
    }

    pub fn synced_images(&self) -> usize {
        self.count_status(|s| *s == ImageStatus::Synced)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        tokio::fs::write(path, json).await?;
        tracing::info!(path = %path.display(), images = self.images.len(), "run report written");
        Ok(())
    }
}
