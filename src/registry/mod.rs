//! Registry module for tag listing
//!
//! This module turns the tag listings of the supported registry kinds into a
//! normalized, time-ordered [`TagIndex`], and reads the mirror target's state
//! through a short-lived cache.

pub mod adapter;
pub mod client;
pub mod destination;
pub mod operations;
pub mod tags;

pub use adapter::{ListingOutcome, TagIndexAdapter};
pub use client::{RegistryHttp, RegistryHttpBuilder};
pub use destination::{DestinationReader, TagCache};
pub use operations::{DistributionAdapter, DockerHubAdapter, GoogleRegistryAdapter, QuayAdapter};
pub use tags::{TagIndex, TagListing, TagRecord};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry API flavours the mirror knows how to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    DockerHub,
    GoogleStyle,
    Quay,
    KubernetesRegistry,
    Distribution,
}

impl RegistryKind {
    /// Pick the API flavour from the registry host of an image reference
    pub fn from_host(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        match host.as_str() {
            "docker.io" | "index.docker.io" | "registry.hub.docker.com" | "hub.docker.com" => {
                RegistryKind::DockerHub
            }
            "quay.io" => RegistryKind::Quay,
            "registry.k8s.io" => RegistryKind::KubernetesRegistry,
            h if h == "gcr.io" || h.ends_with(".gcr.io") || h.ends_with("-docker.pkg.dev") => {
                RegistryKind::GoogleStyle
            }
            _ => RegistryKind::Distribution,
        }
    }

    pub fn build_adapter(self, http: RegistryHttp, host: &str) -> Arc<dyn TagIndexAdapter> {
        match self {
            RegistryKind::DockerHub => Arc::new(DockerHubAdapter::new(http)),
            RegistryKind::GoogleStyle => Arc::new(GoogleRegistryAdapter::new(http, host)),
            RegistryKind::KubernetesRegistry => {
                Arc::new(GoogleRegistryAdapter::new(http, host).kubernetes())
            }
            RegistryKind::Quay => Arc::new(QuayAdapter::new(http)),
            RegistryKind::Distribution => Arc::new(DistributionAdapter::new(http, host)),
        }
    }
}

/// One adapter per registry host, built on first use
pub struct AdapterSet {
    http: RegistryHttp,
    adapters: Mutex<HashMap<String, Arc<dyn TagIndexAdapter>>>,
}

impl AdapterSet {
    pub fn new(http: RegistryHttp) -> Self {
        Self {
            http,
            adapters: Mutex::new(HashMap::new()),
        }
    }

    /// Pin an adapter for `host`, bypassing kind detection
    pub fn register(self, host: &str, adapter: Arc<dyn TagIndexAdapter>) -> Self {
        if let Ok(mut adapters) = self.adapters.lock() {
            adapters.insert(host.to_ascii_lowercase(), adapter);
        }
        self
    }

    pub fn adapter_for(&self, host: &str) -> Arc<dyn TagIndexAdapter> {
        let host = host.to_ascii_lowercase();
        let mut adapters = match self.adapters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        adapters
            .entry(host.clone())
            .or_insert_with(|| RegistryKind::from_host(&host).build_adapter(self.http.clone(), &host))
            .clone()
    }

    pub fn http(&self) -> &RegistryHttp {
        &self.http
    }
}
