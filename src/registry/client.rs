//! HTTP plumbing shared by every registry adapter: one pooled reqwest
//! client with the run's timeout and TLS settings, and a JSON fetch helper
//! that separates "does not exist" from every other failure.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{MirrorError, Result};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_USER_AGENT: &str = concat!("image-mirror/", env!("CARGO_PKG_VERSION"));

pub struct RegistryHttpBuilder {
    timeout: Duration,
    skip_tls: bool,
    user_agent: String,
}

impl Default for RegistryHttpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryHttpBuilder {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            skip_tls: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<RegistryHttp> {
        let mut builder = Client::builder().timeout(self.timeout);
        if self.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder
            .build()
            .map_err(|e| MirrorError::Network(format!("HTTP client setup: {e}")))?;

        Ok(RegistryHttp {
            client,
            user_agent: self.user_agent,
        })
    }
}

/// Cloneable handle around the shared connection pool
#[derive(Clone, Debug)]
pub struct RegistryHttp {
    client: Client,
    user_agent: String,
}

impl RegistryHttp {
    pub fn builder() -> RegistryHttpBuilder {
        RegistryHttpBuilder::new()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` and decode the JSON body.
    ///
    /// Returns `Ok(None)` when the registry affirmatively reports that the
    /// object does not exist, `Err` for anything else that is not a success.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        user_agent: Option<&str>,
        operation: &str,
    ) -> Result<Option<T>> {
        tracing::debug!(url, operation, "registry request");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent.unwrap_or(self.user_agent.as_str()))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, operation))?;

        let (status, body) = read_body(response, operation).await?;
        if status.is_success() {
            return serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| MirrorError::Parse(format!("{operation}: malformed payload: {e}")));
        }
        if HttpErrorHandler::is_object_not_found(status, &body) {
            tracing::debug!(url, %status, "object not found");
            return Ok(None);
        }
        Err(HttpErrorHandler::handle_registry_error(status, &body, operation))
    }

    /// GET `url` as plain text, used for the image catalog.
    pub async fn get_text(&self, url: &str, operation: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, operation))?;

        let (status, body) = read_body(response, operation).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(HttpErrorHandler::handle_registry_error(status, &body, operation))
        }
    }
}

async fn read_body(response: reqwest::Response, operation: &str) -> Result<(StatusCode, String)> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| MirrorError::Network(format!("{operation}: body read interrupted: {e}")))?;
    Ok((status, body))
}
