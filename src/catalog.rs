//! Source catalog loading
//!
//! The catalog is newline-delimited text, one image reference per line
//! without tag. Blank lines and `#` comments are ignored.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{MirrorError, Result};
use crate::image::ImageReference;
use crate::registry::RegistryHttp;
use std::collections::HashSet;
use std::path::PathBuf;

/// Parse catalog text. Entries are canonicalized and de-duplicated keeping
/// the first occurrence; one malformed line rejects the whole catalog.
pub fn parse_catalog(text: &str) -> Result<Vec<ImageReference>> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let image = line
            .parse::<ImageReference>()
            .map_err(|e| match e {
                MirrorError::Validation(message) => {
                    MirrorError::Validation(format!("catalog line {}: {}", number + 1, message))
                }
                other => other,
            })?
            .canonicalize();
        if seen.insert(image.clone()) {
            images.push(image);
        } else {
            tracing::debug!(image = %image, line = number + 1, "duplicate catalog entry skipped");
        }
    }

    Ok(images)
}

fn local_path(source: &str) -> Result<PathBuf> {
    if source.starts_with("file://") {
        let url = url::Url::parse(source)?;
        url.to_file_path()
            .map_err(|_| MirrorError::Validation(format!("Not a local file URL: {}", source)))
    } else {
        Ok(PathBuf::from(source))
    }
}

/// Load the catalog from an `http(s)://` URL, a `file://` URL or a local path.
pub async fn fetch_catalog(http: &RegistryHttp, source: &str) -> Result<Vec<ImageReference>> {
    ValidationErrorHandler::validate_catalog_source(source)?;
    let source = source.trim();

    let text = if source.starts_with("http://") || source.starts_with("https://") {
        http.get_text(source, "catalog fetch").await?
    } else {
        let path = local_path(source)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            MirrorError::Io(format!("Failed to read catalog {}: {}", path.display(), e))
        })?
    };

    let images = parse_catalog(&text)?;
    tracing::info!(source, images = images.len(), "catalog loaded");
    Ok(images)
}
