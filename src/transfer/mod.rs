//! Tag transfer through an external copy tool
//!
//! The mirror never moves image bytes itself: every selected tag is handed to
//! a [`TransferInvoker`], normally [`SkopeoTransfer`].

use crate::error::{MirrorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Mutex;
use tokio::process::Command;

/// Transport prefixes understood by the copy tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    #[default]
    Docker,
    DockerArchive,
    Oci,
    Dir,
    ContainersStorage,
    DockerDaemon,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Docker => "docker",
            Transport::DockerArchive => "docker-archive",
            Transport::Oci => "oci",
            Transport::Dir => "dir",
            Transport::ContainersStorage => "containers-storage",
            Transport::DockerDaemon => "docker-daemon",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Transport::Docker),
            "docker-archive" => Ok(Transport::DockerArchive),
            "oci" => Ok(Transport::Oci),
            "dir" => Ok(Transport::Dir),
            "containers-storage" => Ok(Transport::ContainersStorage),
            "docker-daemon" => Ok(Transport::DockerDaemon),
            other => Err(MirrorError::Config(format!("Unknown transport: {}", other))),
        }
    }
}

/// One tag to copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Source registry host plus path, e.g. `gcr.io/ml-pipeline`
    pub source_repository: String,
    pub name: String,
    pub tag: String,
    /// Destination root, e.g. `docker.io/gcmirrors`
    pub destination_repository: String,
    pub destination_name: String,
    pub source_transport: Transport,
    pub destination_transport: Transport,
}

impl TransferRequest {
    pub fn source_reference(&self) -> String {
        format!(
            "{}://{}/{}:{}",
            self.source_transport, self.source_repository, self.name, self.tag
        )
    }

    pub fn destination_reference(&self) -> String {
        format!(
            "{}://{}/{}:{}",
            self.destination_transport, self.destination_repository, self.destination_name, self.tag
        )
    }
}

#[async_trait]
pub trait TransferInvoker: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<()>;
}

pub const DEFAULT_SKOPEO: &str = "skopeo";

/// Copies tags with `skopeo copy`
#[derive(Debug, Clone)]
pub struct SkopeoTransfer {
    program: String,
}

impl Default for SkopeoTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkopeoTransfer {
    pub fn new() -> Self {
        Self {
            program: DEFAULT_SKOPEO.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn command_args(request: &TransferRequest) -> Vec<String> {
        vec![
            "copy".to_string(),
            "--insecure-policy".to_string(),
            "--src-tls-verify=false".to_string(),
            "--dest-tls-verify=false".to_string(),
            "-q".to_string(),
            request.source_reference(),
            request.destination_reference(),
        ]
    }
}

#[async_trait]
impl TransferInvoker for SkopeoTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<()> {
        let reference = request.source_reference();
        tracing::info!(
            source = %reference,
            destination = %request.destination_reference(),
            "copying tag"
        );

        let output = Command::new(&self.program)
            .args(Self::command_args(request))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MirrorError::Transfer {
                reference: reference.clone(),
                message: format!("failed to launch {}: {}", self.program, e),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = match output.status.code() {
            Some(code) if stderr.is_empty() => format!("exit status {}", code),
            Some(code) => format!("exit status {}: {}", code, stderr),
            None => format!("terminated by signal: {}", stderr),
        };
        Err(MirrorError::Transfer { reference, message })
    }
}

/// Records requests without copying anything
#[derive(Debug, Default)]
pub struct DryRunTransfer {
    requests: Mutex<Vec<TransferRequest>>,
}

impl DryRunTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TransferInvoker for DryRunTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<()> {
        tracing::info!(
            source = %request.source_reference(),
            destination = %request.destination_reference(),
            "dry run, not copying"
        );
        let mut requests = match self.requests.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        requests.push(request.clone());
        Ok(())
    }
}
