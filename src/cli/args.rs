//! Command-line argument parsing

use crate::cli::config::{ENV_LOG_LEVEL, SyncConfig};
use crate::error::Result;
use crate::logging::LogFormat;
use crate::transfer::Transport;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "image-mirror")]
#[command(about = "Incrementally mirror container images between registries")]
#[command(version, author)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet output
    #[arg(long = "quiet", short = 'q', global = true, help = "Suppress progress output")]
    pub quiet: bool,

    /// Log level (falls back to LOG_LEVEL)
    #[arg(long = "log-level", global = true, help = "trace, debug, info, warn or error")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long = "log-format", global = true, value_enum, default_value = "compact")]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one mirror pass
    Sync(SyncArgs),
    /// Show what a mirror pass would copy without copying anything
    Plan(SyncArgs),
    /// Print the tag index of one image
    Tags(TagsArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Image list location (falls back to SRC_IMAGE_LIST_URL)
    #[arg(long = "image-list", short = 'l', help = "Catalog URL, file:// URL or local path")]
    pub image_list: Option<String>,

    /// Destination repository (falls back to DEST_REPO)
    #[arg(long = "dest-repo", short = 'd', help = "Destination root, e.g. docker.io/gcmirrors")]
    pub dest_repo: Option<String>,

    #[arg(long = "src-transport", help = "Copy tool transport for the source")]
    pub src_transport: Option<Transport>,

    #[arg(long = "dest-transport", help = "Copy tool transport for the destination")]
    pub dest_transport: Option<Transport>,

    /// Number of images processed concurrently (falls back to THREAD_POOL_NUM)
    #[arg(long = "pool-size", short = 'j')]
    pub pool_size: Option<usize>,

    /// Number of daily batches for large catalogs (falls back to JOB_BATCH_COUNT)
    #[arg(long = "batch-count")]
    pub batch_count: Option<usize>,

    /// Ignore history pushed at or before this epoch millisecond
    #[arg(long = "sync-after-ms")]
    pub sync_after_ms: Option<i64>,

    /// Lifetime of cached destination listings in seconds
    #[arg(long = "cache-ttl")]
    pub cache_ttl_secs: Option<u64>,

    /// Timeout in seconds for registry requests
    #[arg(long = "timeout", short = 't')]
    pub http_timeout_secs: Option<u64>,

    /// Skip TLS verification
    #[arg(long = "skip-tls", short = 'k', help = "Skip TLS certificate verification")]
    pub skip_tls: bool,

    /// Write the run report as JSON
    #[arg(long = "report", short = 'o')]
    pub report: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TagsArgs {
    /// Image reference without tag, e.g. k8s.gcr.io/pause
    pub image: String,

    #[arg(long = "timeout", short = 't')]
    pub http_timeout_secs: Option<u64>,

    #[arg(long = "skip-tls", short = 'k')]
    pub skip_tls: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Level requested on the command line or through LOG_LEVEL
    pub fn log_level_name(&self) -> Option<String> {
        self.log_level
            .clone()
            .or_else(|| std::env::var(ENV_LOG_LEVEL).ok())
    }
}

impl SyncArgs {
    /// Command-line values win over `base`, which carries environment and
    /// defaults.
    pub fn apply(&self, base: SyncConfig, dry_run: bool) -> SyncConfig {
        let mut config = base.with_dry_run(dry_run);

        if let Some(image_list) = &self.image_list {
            config = config.with_image_list(image_list.clone());
        }
        if let Some(dest_repo) = &self.dest_repo {
            config = config.with_destination(dest_repo.clone());
        }
        let source = self.src_transport.unwrap_or(config.source_transport);
        let destination = self.dest_transport.unwrap_or(config.destination_transport);
        config = config.with_transports(source, destination);
        if let Some(pool_size) = self.pool_size {
            config = config.with_pool_size(pool_size);
        }
        if let Some(batch_count) = self.batch_count {
            config = config.with_batch_count(batch_count);
        }
        if let Some(sync_after_ms) = self.sync_after_ms {
            config = config.with_sync_after_ms(sync_after_ms);
        }
        if let Some(secs) = self.cache_ttl_secs {
            config = config.with_cache_ttl_secs(secs);
        }
        if let Some(secs) = self.http_timeout_secs {
            config = config.with_http_timeout_secs(secs);
        }
        if self.skip_tls {
            config = config.with_skip_tls(true);
        }
        config.with_report_path(self.report.clone())
    }

    /// Resolve against the process environment and validate
    pub fn resolve(&self, dry_run: bool) -> Result<SyncConfig> {
        let config = self.apply(SyncConfig::from_env()?, dry_run);
        config.validate()?;
        Ok(config)
    }
}
