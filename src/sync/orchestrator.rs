//! Bounded-concurrency mirror pass over a catalog
//!
//! Every image runs in its own task; a semaphore caps how many are in flight.
//! Whatever happens inside one image (error or panic) ends up as a failed
//! report entry, never as an aborted run.

use crate::error::{MirrorError, Result};
use crate::image::{DestinationRoot, ImageReference, destination_name};
use crate::registry::{AdapterSet, DestinationReader};
use crate::sync::engine::{DestinationState, SyncEngine};
use crate::sync::report::{ImageReport, TagFailure};
use crate::transfer::{TransferInvoker, TransferRequest, Transport};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_POOL_SIZE: usize = 2;

/// Everything one image needs, shared read-only by all tasks
#[derive(Clone)]
struct ImageSyncer {
    sources: Arc<AdapterSet>,
    destination: Arc<DestinationReader>,
    destination_root: DestinationRoot,
    transfer: Arc<dyn TransferInvoker>,
    engine: SyncEngine,
    source_transport: Transport,
    destination_transport: Transport,
}

impl ImageSyncer {
    fn destination_name(&self, image: &ImageReference) -> String {
        destination_name(
            &image.repository(),
            &self.destination_root.repository(),
            &image.short_name,
        )
    }

    async fn sync_image(&self, image: &ImageReference) -> Result<ImageReport> {
        let dest_name = self.destination_name(image);
        tracing::debug!(image = %image, destination = %dest_name, "syncing image");

        let adapter = self.sources.adapter_for(&image.registry_host);
        let source = adapter.sorted_tags(&image.name_in_registry()).await;
        if !source.ok {
            return Err(MirrorError::Registry(format!(
                "source tag listing for {} was inconclusive",
                image
            )));
        }

        let target = self.destination_root.name_in_registry(&dest_name);
        let listing = self.destination.sorted_tags(&target).await;
        let (last_tag, last_timestamp) = self.destination.last_tag(&target, Some(&listing.index)).await;
        let state = DestinationState::new(listing, last_tag, last_timestamp);

        let decision = self.engine.decide(&dest_name, &source.index, &state);

        let mut transferred = Vec::new();
        let mut failed = Vec::new();
        for tag in &decision.tags_to_transfer {
            let request = TransferRequest {
                source_repository: image.repository(),
                name: image.short_name.clone(),
                tag: tag.clone(),
                destination_repository: self.destination_root.repository(),
                destination_name: dest_name.clone(),
                source_transport: self.source_transport,
                destination_transport: self.destination_transport,
            };
            match self.transfer.transfer(&request).await {
                Ok(()) => transferred.push(tag.clone()),
                Err(e) => {
                    tracing::warn!(image = %image, tag = %tag, error = %e, "transfer failed");
                    failed.push(TagFailure {
                        tag: tag.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let report = ImageReport::from_decision(image, decision, transferred, failed);
        tracing::info!(
            image = %image,
            destination = %report.destination_name,
            tags = report.tag_count,
            transferred = report.transferred.len(),
            failed = report.failed.len(),
            "image processed"
        );
        Ok(report)
    }

    /// Wait for a pool slot, then sync `image`. Every outcome, including a
    /// closed pool or a panic, becomes a report entry.
    async fn sync_with_permit(&self, semaphore: &Semaphore, image: &ImageReference) -> ImageReport {
        let dest_name = self.destination_name(image);
        let _permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                let error = MirrorError::WorkerPool(format!("no worker slot for {image}: {e}"));
                tracing::error!(image = %image, error = %error, "image not started");
                return ImageReport::failed(image, &dest_name, error.to_string());
            }
        };

        match AssertUnwindSafe(self.sync_image(image)).catch_unwind().await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::warn!(image = %image, error = %e, "image failed");
                ImageReport::failed(image, &dest_name, e.to_string())
            }
            Err(panic) => {
                let error = MirrorError::WorkerPanic(panic_message(panic));
                tracing::error!(image = %image, error = %error, "image worker panicked");
                ImageReport::failed(image, &dest_name, error.to_string())
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct SyncOrchestrator {
    syncer: ImageSyncer,
    pool_size: usize,
}

impl SyncOrchestrator {
    pub fn new(
        sources: Arc<AdapterSet>,
        destination: Arc<DestinationReader>,
        destination_root: DestinationRoot,
        transfer: Arc<dyn TransferInvoker>,
    ) -> Self {
        Self {
            syncer: ImageSyncer {
                sources,
                destination,
                destination_root,
                transfer,
                engine: SyncEngine::default(),
                source_transport: Transport::default(),
                destination_transport: Transport::default(),
            },
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_engine(mut self, engine: SyncEngine) -> Self {
        self.syncer.engine = engine;
        self
    }

    pub fn with_transports(mut self, source: Transport, destination: Transport) -> Self {
        self.syncer.source_transport = source;
        self.syncer.destination_transport = destination;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Process `images` and return one report entry per image, in catalog
    /// order.
    pub async fn run(&self, images: &[ImageReference]) -> Vec<ImageReport> {
        let syncer = Arc::new(self.syncer.clone());
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut tasks = JoinSet::new();

        for (slot, image) in images.iter().cloned().enumerate() {
            let syncer = Arc::clone(&syncer);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move { (slot, syncer.sync_with_permit(&semaphore, &image).await) });
        }

        let mut slots: Vec<Option<ImageReport>> = vec![None; images.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, report)) => slots[slot] = Some(report),
                Err(e) => tracing::error!(error = %e, "image task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(images)
            .map(|(slot, image)| {
                slot.unwrap_or_else(|| {
                    ImageReport::failed(
                        image,
                        &syncer.destination_name(image),
                        "image task did not report",
                    )
                })
            })
            .collect()
    }
}
