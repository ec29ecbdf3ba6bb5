//! Input resolution: load a page's HTML from a local file or an HTTP(S) URL.
//!
//! The extractor needs the markup plus the URL the page lives at, because
//! image `src` attributes are resolved against it. For a downloaded page that
//! is the final URL after redirects; for a local file it is the caller's
//! `base_url` if given, else a `file://` URL for the canonical path.

use crate::error::Page2AnkiError;
use reqwest::Url;
use std::path::PathBuf;
use tracing::{debug, info};

/// A page ready for extraction.
#[derive(Debug, Clone)]
pub struct PageSource {
    pub html: String,
    pub source_url: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to page markup.
///
/// `base_url` overrides the recorded source URL for local files.
pub async fn load_page(
    input: &str,
    base_url: Option<&str>,
    timeout_secs: u64,
) -> Result<PageSource, Page2AnkiError> {
    if input.trim().is_empty() {
        return Err(Page2AnkiError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_page(input, timeout_secs).await
    } else {
        read_local(input, base_url).await
    }
}

async fn read_local(path_str: &str, base_url: Option<&str>) -> Result<PageSource, Page2AnkiError> {
    let path = PathBuf::from(path_str);

    let html = match tokio::fs::read(&path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Page2AnkiError::PermissionDenied { path });
        }
        Err(_) => return Err(Page2AnkiError::FileNotFound { path }),
    };

    let source_url = match base_url {
        Some(base) => base.to_string(),
        None => std::fs::canonicalize(&path)
            .ok()
            .and_then(|abs| Url::from_file_path(abs).ok())
            .map(|u| u.to_string())
            .unwrap_or_default(),
    };

    debug!("Read local page: {} ({} bytes)", path.display(), html.len());
    Ok(PageSource { html, source_url })
}

async fn download_page(url: &str, timeout_secs: u64) -> Result<PageSource, Page2AnkiError> {
    info!("Downloading page from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Page2AnkiError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Page2AnkiError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Page2AnkiError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Page2AnkiError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let final_url = response.url().to_string();
    let html = response
        .text()
        .await
        .map_err(|e| Page2AnkiError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes from {}", html.len(), final_url);
    Ok(PageSource {
        html,
        source_url: final_url,
    })
}
