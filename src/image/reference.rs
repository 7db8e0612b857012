//! Parsing of fully-qualified image references and destination roots

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host used when a reference carries no registry component
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Legacy namespace that now lives on `k8s.gcr.io`
const LEGACY_GOOGLE_CONTAINERS: &str = "gcr.io/google-containers";
const LEGACY_GOOGLE_CONTAINERS_HOST: &str = "k8s.gcr.io";

/// A source image without tag: `host/path.../short_name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub registry_host: String,
    pub repository_path: Vec<String>,
    pub short_name: String,
}

impl ImageReference {
    /// Registry host plus path, e.g. `gcr.io/ml-pipeline` or `k8s.gcr.io`
    pub fn repository(&self) -> String {
        if self.repository_path.is_empty() {
            self.registry_host.clone()
        } else {
            format!("{}/{}", self.registry_host, self.repository_path.join("/"))
        }
    }

    /// Name inside the registry, e.g. `ml-pipeline/api-server`
    pub fn name_in_registry(&self) -> String {
        let mut segments = self.repository_path.clone();
        segments.push(self.short_name.clone());
        segments.join("/")
    }

    /// Rewrite references under the retired `gcr.io/google-containers`
    /// project to the host that serves them today.
    pub fn canonicalize(self) -> Self {
        let full = self.to_string();
        match full.strip_prefix(LEGACY_GOOGLE_CONTAINERS) {
            Some(rest) if rest.starts_with('/') => {
                let rewritten = format!("{}{}", LEGACY_GOOGLE_CONTAINERS_HOST, rest);
                rewritten.parse().unwrap_or(self)
            }
            _ => self,
        }
    }
}

fn looks_like_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

fn validate_segment(segment: &str, line: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(MirrorError::Validation(format!(
            "Empty path segment in image reference: {}",
            line
        )));
    }
    if segment.chars().any(char::is_whitespace) {
        return Err(MirrorError::Validation(format!(
            "Whitespace in image reference: {}",
            line
        )));
    }
    Ok(())
}

impl FromStr for ImageReference {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim();
        if line.is_empty() {
            return Err(MirrorError::Validation(
                "Image reference cannot be empty".to_string(),
            ));
        }
        if line.contains('@') {
            return Err(MirrorError::Validation(format!(
                "Image reference must not pin a digest: {}",
                line
            )));
        }

        let mut segments: Vec<&str> = line.split('/').collect();
        for segment in &segments {
            validate_segment(segment, line)?;
        }

        let short_name = segments.pop().unwrap_or_default();
        if short_name.contains(':') {
            return Err(MirrorError::Validation(format!(
                "Image reference must not carry a tag: {}",
                line
            )));
        }

        let registry_host = match segments.first() {
            Some(first) if looks_like_host(first) => segments.remove(0).to_ascii_lowercase(),
            _ => DEFAULT_REGISTRY.to_string(),
        };

        Ok(ImageReference {
            registry_host,
            repository_path: segments.into_iter().map(str::to_string).collect(),
            short_name: short_name.to_string(),
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository(), self.short_name)
    }
}

/// Where mirrored images land: `docker.io/gcmirrors`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRoot {
    pub registry_host: String,
    pub namespace: Vec<String>,
}

impl DestinationRoot {
    pub fn repository(&self) -> String {
        if self.namespace.is_empty() {
            self.registry_host.clone()
        } else {
            format!("{}/{}", self.registry_host, self.namespace.join("/"))
        }
    }

    /// Registry-local name of a mirrored image, e.g. `gcmirrors/pause`
    pub fn name_in_registry(&self, destination_name: &str) -> String {
        if self.namespace.is_empty() {
            destination_name.to_string()
        } else {
            format!("{}/{}", self.namespace.join("/"), destination_name)
        }
    }

    pub fn is_docker_hub(&self) -> bool {
        crate::registry::RegistryKind::from_host(&self.registry_host)
            == crate::registry::RegistryKind::DockerHub
    }
}

impl FromStr for DestinationRoot {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(MirrorError::Validation(
                "Destination repository cannot be empty".to_string(),
            ));
        }
        let mut segments: Vec<&str> = trimmed.split('/').collect();
        for segment in &segments {
            validate_segment(segment, trimmed)?;
        }
        let registry_host = if looks_like_host(segments[0]) {
            segments.remove(0).to_ascii_lowercase()
        } else {
            DEFAULT_REGISTRY.to_string()
        };
        Ok(DestinationRoot {
            registry_host,
            namespace: segments.into_iter().map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for DestinationRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository())
    }
}
