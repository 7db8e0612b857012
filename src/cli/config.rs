//! Resolved run configuration

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{MirrorError, Result};
use crate::image::DestinationRoot;
use crate::registry::client::DEFAULT_TIMEOUT_SECS;
use crate::registry::destination::DEFAULT_CACHE_TTL;
use crate::sync::{BATCH_THRESHOLD, BatchPartitioner, DEFAULT_POOL_SIZE};
use crate::transfer::Transport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_IMAGE_LIST_URL: &str =
    "https://raw.githubusercontent.com/x-mirrors/gcr.io/main/k8s.txt";
pub const DEFAULT_DEST_REPO: &str = "docker.io/gcmirrors";
pub const DEFAULT_BATCH_COUNT: usize = 3;

pub const ENV_IMAGE_LIST_URL: &str = "SRC_IMAGE_LIST_URL";
pub const ENV_DEST_REPO: &str = "DEST_REPO";
pub const ENV_SRC_TRANSPORT: &str = "SRC_TRANSPORT";
pub const ENV_DEST_TRANSPORT: &str = "DEST_TRANSPORT";
pub const ENV_POOL_SIZE: &str = "THREAD_POOL_NUM";
pub const ENV_BATCH_COUNT: &str = "JOB_BATCH_COUNT";
pub const ENV_SYNC_AFTER_MS: &str = "SYNC_AFTER_MS";
pub const ENV_CACHE_TTL_SECS: &str = "CACHE_TTL_SECS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Parameters of one mirror pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub image_list: String,
    pub destination: String,
    pub source_transport: Transport,
    pub destination_transport: Transport,
    pub pool_size: usize,
    pub batch_count: usize,
    pub batch_threshold: usize,
    /// Tags pushed at or before this epoch millisecond never move the scan
    pub sync_after_ms: i64,
    pub cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub skip_tls: bool,
    pub report_path: Option<PathBuf>,
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            image_list: DEFAULT_IMAGE_LIST_URL.to_string(),
            destination: DEFAULT_DEST_REPO.to_string(),
            source_transport: Transport::Docker,
            destination_transport: Transport::Docker,
            pool_size: DEFAULT_POOL_SIZE,
            batch_count: DEFAULT_BATCH_COUNT,
            batch_threshold: BATCH_THRESHOLD,
            sync_after_ms: 0,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            http_timeout_secs: DEFAULT_TIMEOUT_SECS,
            skip_tls: false,
            report_path: None,
            dry_run: false,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| MirrorError::Config(format!("Invalid {} value '{}': {}", name, value, e)))
}

impl SyncConfig {
    /// Defaults overridden by the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = lookup(ENV_IMAGE_LIST_URL) {
            config.image_list = val;
        }
        if let Some(val) = lookup(ENV_DEST_REPO) {
            config.destination = val;
        }
        if let Some(val) = lookup(ENV_SRC_TRANSPORT) {
            config.source_transport = val.parse()?;
        }
        if let Some(val) = lookup(ENV_DEST_TRANSPORT) {
            config.destination_transport = val.parse()?;
        }
        if let Some(val) = lookup(ENV_POOL_SIZE) {
            config.pool_size = parse_var(ENV_POOL_SIZE, &val)?;
        }
        if let Some(val) = lookup(ENV_BATCH_COUNT) {
            config.batch_count = parse_var(ENV_BATCH_COUNT, &val)?;
        }
        if let Some(val) = lookup(ENV_SYNC_AFTER_MS) {
            config.sync_after_ms = parse_var(ENV_SYNC_AFTER_MS, &val)?;
        }
        if let Some(val) = lookup(ENV_CACHE_TTL_SECS) {
            config.cache_ttl_secs = parse_var(ENV_CACHE_TTL_SECS, &val)?;
        }
        if let Some(val) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            config.http_timeout_secs = parse_var(ENV_HTTP_TIMEOUT_SECS, &val)?;
        }

        Ok(config)
    }

    pub fn with_image_list(mut self, image_list: impl Into<String>) -> Self {
        self.image_list = image_list.into();
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_transports(mut self, source: Transport, destination: Transport) -> Self {
        self.source_transport = source;
        self.destination_transport = destination;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_batch_count(mut self, batch_count: usize) -> Self {
        self.batch_count = batch_count;
        self
    }

    pub fn with_sync_after_ms(mut self, sync_after_ms: i64) -> Self {
        self.sync_after_ms = sync_after_ms;
        self
    }

    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_report_path(mut self, path: Option<PathBuf>) -> Self {
        self.report_path = path;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn destination_root(&self) -> Result<DestinationRoot> {
        self.destination.parse()
    }

    pub fn partitioner(&self) -> Result<BatchPartitioner> {
        Ok(BatchPartitioner::new(self.batch_count)?.with_threshold(self.batch_threshold))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        ValidationErrorHandler::validate_catalog_source(&self.image_list)?;

        if self.destination.trim().is_empty() {
            return Err(MirrorError::Config(
                "Destination repository cannot be empty".to_string(),
            ));
        }
        self.destination_root()?;

        if self.pool_size == 0 {
            return Err(MirrorError::Config(
                "Worker pool size must be greater than 0".to_string(),
            ));
        }
        self.partitioner()?;

        if self.sync_after_ms < 0 {
            return Err(MirrorError::Config(
                "Sync cutoff cannot be negative".to_string(),
            ));
        }

        ValidationErrorHandler::validate_timeout(self.http_timeout_secs)?;
        Ok(())
    }
}
