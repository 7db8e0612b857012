//! Error classification shared by the registry adapters and config checks

use crate::error::MirrorError;
use reqwest::StatusCode;

/// Maps registry HTTP failures onto [`MirrorError`] variants
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// 404 and 429 get their own variants because callers branch on them;
    /// everything else is a plain registry error.
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> MirrorError {
        let body = error_text.trim();
        match status {
            StatusCode::NOT_FOUND => MirrorError::NotFound(format!("{operation}: {body}")),
            StatusCode::TOO_MANY_REQUESTS => {
                MirrorError::RateLimited(format!("{operation} throttled by registry: {body}"))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MirrorError::Registry(format!(
                "{operation} refused ({status}), repository may be private: {body}"
            )),
            s if s.is_server_error() => {
                MirrorError::Registry(format!("{operation} hit a registry outage ({status}): {body}"))
            }
            _ => MirrorError::Registry(format!("{operation} returned {status}: {body}")),
        }
    }

    /// Docker Hub reports missing repositories with a message body, sometimes
    /// on statuses other than 404.
    pub fn is_object_not_found(status: StatusCode, error_text: &str) -> bool {
        status == StatusCode::NOT_FOUND
            || error_text.to_ascii_lowercase().contains("object not found")
    }
}

/// Classifies transport-level reqwest failures
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> MirrorError {
        if error.is_decode() {
            return MirrorError::Parse(format!("{context}: undecodable response: {error}"));
        }
        let kind = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "could not connect"
        } else if error.is_redirect() {
            "redirect loop"
        } else {
            "transport failure"
        };
        MirrorError::Network(format!("{context}: {kind}: {error}"))
    }
}

const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Checks applied to user-supplied settings before a pass starts
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    /// Standard URL validation for the catalog source
    pub fn validate_catalog_source(source: &str) -> crate::error::Result<()> {
        if source.trim().is_empty() {
            return Err(MirrorError::Validation(
                "Image list source cannot be empty".to_string(),
            ));
        }

        if source.contains("://")
            && !(source.starts_with("http://")
                || source.starts_with("https://")
                || source.starts_with("file://"))
        {
            return Err(MirrorError::Validation(format!(
                "Unsupported image list scheme (expected http, https or file): {}",
                source
            )));
        }

        Ok(())
    }

    /// Seconds in `1..=MAX_TIMEOUT_SECS`
    pub fn validate_timeout(timeout: u64) -> crate::error::Result<()> {
        if (1..=MAX_TIMEOUT_SECS).contains(&timeout) {
            Ok(())
        } else {
            Err(MirrorError::Validation(format!(
                "HTTP timeout of {timeout}s is outside 1..={MAX_TIMEOUT_SECS}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_404_maps_to_not_found() {
        let err = HttpErrorHandler::handle_registry_error(StatusCode::NOT_FOUND, "gone", "tag listing");
        assert!(matches!(err, MirrorError::NotFound(_)));
        assert!(!err.is_inconclusive());
    }

    #[test]
    fn status_429_is_inconclusive_rate_limit() {
        let err = HttpErrorHandler::handle_registry_error(
            StatusCode::TOO_MANY_REQUESTS,
            "slow down",
            "tag listing",
        );
        assert!(matches!(err, MirrorError::RateLimited(_)));
        assert!(err.is_inconclusive());
    }

    #[test]
    fn object_not_found_message_detected() {
        assert!(HttpErrorHandler::is_object_not_found(
            StatusCode::BAD_REQUEST,
            r#"{"message":"httperror 404: object not found"}"#
        ));
        assert!(!HttpErrorHandler::is_object_not_found(
            StatusCode::INTERNAL_SERVER_ERROR,
            "boom"
        ));
    }

    #[test]
    fn server_errors_stay_registry_errors() {
        let err = HttpErrorHandler::handle_registry_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "down",
            "tag listing",
        );
        assert!(matches!(err, MirrorError::Registry(_)));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn timeout_bounds() {
        assert!(ValidationErrorHandler::validate_timeout(0).is_err());
        assert!(ValidationErrorHandler::validate_timeout(30).is_ok());
        assert!(ValidationErrorHandler::validate_timeout(86_401).is_err());
    }

    #[test]
    fn catalog_source_schemes() {
        assert!(ValidationErrorHandler::validate_catalog_source("https://example.com/list.txt").is_ok());
        assert!(ValidationErrorHandler::validate_catalog_source("./images.txt").is_ok());
        assert!(ValidationErrorHandler::validate_catalog_source("ftp://example.com/x").is_err());
        assert!(ValidationErrorHandler::validate_catalog_source("  ").is_err());
    }
}
