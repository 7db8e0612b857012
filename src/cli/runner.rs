//! Runner wiring configuration, registries and the orchestrator together

use crate::catalog::fetch_catalog;
use crate::cli::args::{Args, Command, SyncArgs, TagsArgs};
use crate::cli::config::SyncConfig;
use crate::error::{MirrorError, Result};
use crate::image::ImageReference;
use crate::logging::Logger;
use crate::registry::client::DEFAULT_TIMEOUT_SECS;
use crate::registry::{AdapterSet, DestinationReader, RegistryHttp};
use crate::sync::batch::current_hour;
use crate::sync::{ImageStatus, RunReport, SyncEngine, SyncOrchestrator};
use crate::transfer::{DryRunTransfer, SkopeoTransfer, TransferInvoker};
use std::sync::Arc;
use std::time::Duration;

/// What the binary should report back to the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The run finished but some images failed
    Partial,
}

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };
        Self { args, output }
    }

    pub async fn run(&self) -> Result<Outcome> {
        match &self.args.command {
            Command::Sync(sync) => self.run_sync(sync, false).await,
            Command::Plan(sync) => self.run_sync(sync, true).await,
            Command::Tags(tags) => self.show_tags(tags).await,
        }
    }

    async fn run_sync(&self, args: &SyncArgs, dry_run: bool) -> Result<Outcome> {
        self.output.section(if dry_run { "Image Mirror (plan)" } else { "Image Mirror" });
        let config = args.resolve(dry_run)?;
        let report = run_pass(&config, &self.output).await?;

        if let Some(path) = &config.report_path {
            report.write_json(path).await?;
            self.output.step(&format!("Report written to {}", path.display()));
        }

        if report.failed_images() > 0 {
            Ok(Outcome::Partial)
        } else {
            Ok(Outcome::Success)
        }
    }

    async fn show_tags(&self, args: &TagsArgs) -> Result<Outcome> {
        let image = args.image.parse::<ImageReference>()?.canonicalize();
        let http = RegistryHttp::builder()
            .with_timeout(Duration::from_secs(
                args.http_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .with_skip_tls(args.skip_tls)
            .build()?;
        let adapters = AdapterSet::new(http);
        let adapter = adapters.adapter_for(&image.registry_host);

        self.output.step(&format!("Listing {} via {}", image, adapter.kind()));
        let listing = adapter.sorted_tags(&image.name_in_registry()).await;
        if !listing.ok {
            return Err(MirrorError::Registry(format!(
                "tag listing for {} was inconclusive",
                image
            )));
        }

        for record in listing.index.records() {
            let pushed = if listing.index.has_push_times() {
                chrono::DateTime::from_timestamp_millis(record.pushed_at_ms)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| record.pushed_at_ms.to_string())
            } else {
                "-".to_string()
            };
            println!(
                "{}\t{}\t{}",
                record.tag,
                pushed,
                record.digest.as_deref().unwrap_or("-")
            );
        }
        self.output.info(&format!("{} tags", listing.index.len()));
        Ok(Outcome::Success)
    }
}

/// One complete mirror pass: catalog, batch selection, per-image sync.
pub async fn run_pass(config: &SyncConfig, output: &Logger) -> Result<RunReport> {
    let http = RegistryHttp::builder()
        .with_timeout(config.http_timeout())
        .with_skip_tls(config.skip_tls)
        .build()?;
    let destination_root = config.destination_root()?;

    output.step(&format!("Loading image list from {}", config.image_list));
    let images = fetch_catalog(&http, &config.image_list).await?;

    let window = config.partitioner()?.select(
        images.len(),
        destination_root.is_docker_hub(),
        current_hour(),
    );
    let selected = match &window {
        Some(window) => {
            output.info(&format!(
                "Batch {} of {}: images {}..{} of {}",
                window.batch_number + 1,
                config.batch_count,
                window.start_index,
                window.end_index,
                images.len()
            ));
            window.slice(&images)
        }
        None => &images[..],
    };

    let sources = Arc::new(AdapterSet::new(http));
    let destination = Arc::new(
        DestinationReader::new(sources.adapter_for(&destination_root.registry_host))
            .with_ttl(config.cache_ttl()),
    );
    let transfer: Arc<dyn TransferInvoker> = if config.dry_run {
        Arc::new(DryRunTransfer::new())
    } else {
        Arc::new(SkopeoTransfer::new())
    };

    output.step(&format!(
        "Mirroring {} images to {} with {} workers",
        selected.len(),
        destination_root,
        config.pool_size
    ));

    let report = RunReport::new(window);
    let orchestrator = SyncOrchestrator::new(sources, destination, destination_root, transfer)
        .with_pool_size(config.pool_size)
        .with_engine(SyncEngine::new(config.sync_after_ms))
        .with_transports(config.source_transport, config.destination_transport);
    let images = orchestrator.run(selected).await;
    let report = report.finish(images);

    for image in &report.images {
        match &image.status {
            ImageStatus::Failed(message) => {
                output.warning(&format!("{} -> {}: {}", image.source, image.destination_name, message))
            }
            ImageStatus::Deferred => output.warning(&format!(
                "{} -> {}: destination unavailable, deferred",
                image.source, image.destination_name
            )),
            _ => output.detail(&format!(
                "{} -> {}: {}/{} tags transferred",
                image.source,
                image.destination_name,
                image.transferred.len(),
                image.tag_count
            )),
        }
    }

    output.summary_kv(
        if config.dry_run { "Plan summary" } else { "Sync summary" },
        &[
            ("Images", report.total_images().to_string()),
            ("Synced", report.synced_images().to_string()),
            ("Deferred", report.deferred_images().to_string()),
            ("Failed", report.failed_images().to_string()),
            (
                if config.dry_run { "Tags to copy" } else { "Tags copied" },
                report.total_transferred().to_string(),
            ),
            ("Elapsed", output.format_duration(output.elapsed())),
        ],
    );

    Ok(report)
}
