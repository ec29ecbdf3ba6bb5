//! Media fetching: image URL → base64 `data:` URL for `storeMediaFile`.
//!
//! AnkiConnect accepts media as base64 in the JSON request body. Images are
//! small, so the whole response is buffered; there is no streaming and no
//! retry. A URL that is already a `data:` URL is returned unchanged.

use crate::config::Configuration;
use crate::error::{MediaError, Page2AnkiError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::percent_decode_str;
use reqwest::header::CONTENT_TYPE;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Prefix of every media file this crate stores.
pub const MEDIA_PREFIX: &str = "learnable_meta";

const FALLBACK_MIME: &str = "application/octet-stream";
const FALLBACK_EXTENSION: &str = "jpg";

/// Source of base64-encoded media.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fetch `url` and return it as a `data:<mime>;base64,<payload>` URL.
    async fn fetch_as_base64(&self, url: &str) -> Result<String, MediaError>;
}

/// Fetches images over HTTP with one GET per call.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpMediaFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, Page2AnkiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Page2AnkiError::Internal(format!("HTTP client build failed: {e}")))?;
        Ok(Self { client, timeout_secs })
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> MediaError {
        if e.is_timeout() {
            MediaError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            MediaError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    pub fn from_config(config: &Configuration) -> Result<Self, Page2AnkiError> {
        Self::new(config.request_timeout_secs)
    }
}

#[async_trait]
impl MediaSource for HttpMediaFetcher {
    async fn fetch_as_base64(&self, url: &str) -> Result<String, MediaError> {
        if is_data_url(url) {
            return Ok(url.to_string());
        }

        debug!("Fetching image: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(FALLBACK_MIME)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.request_error(url, e))?;

        debug!("Fetched {} bytes ({})", bytes.len(), mime);
        Ok(to_data_url(&mime, &bytes))
    }
}

pub fn is_data_url(url: &str) -> bool {
    url.starts_with("data:")
}

/// `data:<mime>;base64,<payload>`
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// The base64 payload of a `data:` URL, as `storeMediaFile` expects it.
///
/// Payloads that are not already base64 are percent-decoded, then encoded.
pub fn data_url_payload(data_url: &str) -> Result<String, MediaError> {
    let rest = data_url.strip_prefix("data:").ok_or(MediaError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(MediaError::InvalidDataUrl)?;
    if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        Ok(payload.to_string())
    } else {
        let bytes: Vec<u8> = percent_decode_str(payload).collect();
        Ok(STANDARD.encode(bytes))
    }
}

/// `learnable_meta_<stamp>.<ext>` for the image at `url`.
pub fn media_filename(url: &str, stamp: u64) -> String {
    format!("{}_{}.{}", MEDIA_PREFIX, stamp, extension_for(url))
}

fn extension_for(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("data:") {
        let mime = rest.split([';', ',']).next().unwrap_or("");
        let subtype = mime.split('/').nth(1).unwrap_or("");
        return match subtype {
            "jpeg" => "jpg".to_string(),
            "svg+xml" => "svg".to_string(),
            s if is_plain_extension(s) => s.to_ascii_lowercase(),
            _ => FALLBACK_EXTENSION.to_string(),
        };
    }

    let last = url.rsplit('/').next().unwrap_or("");
    let name = last.split(['?', '#']).next().unwrap_or("");
    match name.rsplit_once('.') {
        Some((_, ext)) if is_plain_extension(ext) => ext.to_ascii_lowercase(),
        _ => FALLBACK_EXTENSION.to_string(),
    }
}

fn is_plain_extension(ext: &str) -> bool {
    (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Current time in milliseconds, bumped so no two calls in this process
/// return the same value.
pub fn next_stamp() -> u64 {
    let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut prev = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_STAMP.compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `head` to every connection after reading the request, then
    /// keep the socket open without sending anything else.
    async fn stalling_server(head: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(head.as_bytes()).await;
                held.push(stream);
            }
        });
        format!("http://{addr}/map.png")
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let url = stalling_server(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let fetcher = HttpMediaFetcher::new(5).unwrap();
        let err = fetcher.fetch_as_base64(&url).await.unwrap_err();
        assert!(
            matches!(err, MediaError::HttpStatus { status: 404, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let url = stalling_server("").await;
        let fetcher = HttpMediaFetcher::new(1).unwrap();
        let err = fetcher.fetch_as_base64(&url).await.unwrap_err();
        assert!(matches!(err, MediaError::Timeout { secs: 1, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let url = stalling_server(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 64\r\n\r\nPNG",
        )
        .await;
        let fetcher = HttpMediaFetcher::new(1).unwrap();
        let err = fetcher.fetch_as_base64(&url).await.unwrap_err();
        assert!(matches!(err, MediaError::Timeout { secs: 1, .. }), "got {err:?}");
    }

    #[test]
    fn data_url_is_returned_unchanged() {
        let fetcher = HttpMediaFetcher::new(5).unwrap();
        let url = "data:image/png;base64,iVBORw0KGgo=";
        let out = tokio_test::block_on(fetcher.fetch_as_base64(url)).unwrap();
        assert_eq!(out, url);
    }

    #[test]
    fn encodes_bytes_as_data_url() {
        let url = to_data_url("image/png", b"\x89PNG");
        assert_eq!(url, "data:image/png;base64,iVBORw==");
        assert_eq!(data_url_payload(&url).unwrap(), "iVBORw==");
    }

    #[test]
    fn non_base64_payload_is_encoded() {
        let payload = data_url_payload("data:image/svg+xml,<svg/>").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), b"<svg/>");

        let payload = data_url_payload("data:image/svg+xml,%3Csvg%2F%3E").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), b"<svg/>");
    }

    #[test]
    fn malformed_data_url_is_rejected() {
        assert!(matches!(
            data_url_payload("data:image/png;base64"),
            Err(MediaError::InvalidDataUrl)
        ));
        assert!(data_url_payload("https://example.com/a.png").is_err());
    }

    #[test]
    fn filename_uses_url_extension() {
        assert_eq!(
            media_filename("https://cdn.example.com/maps/road.PNG?w=300#x", 17),
            "learnable_meta_17.png"
        );
        assert_eq!(media_filename("https://cdn.example.com/maps/road", 17), "learnable_meta_17.jpg");
        assert_eq!(
            media_filename("https://cdn.example.com/a.b/c.weird-ext", 17),
            "learnable_meta_17.jpg"
        );
    }

    #[test]
    fn filename_for_data_url_uses_mime() {
        assert_eq!(media_filename("data:image/jpeg;base64,AAAA", 5), "learnable_meta_5.jpg");
        assert_eq!(media_filename("data:image/webp;base64,AAAA", 5), "learnable_meta_5.webp");
        assert_eq!(media_filename("data:image/svg+xml,<svg/>", 5), "learnable_meta_5.svg");
    }

    #[test]
    fn stamps_strictly_increase() {
        let a = next_stamp();
        let b = next_stamp();
        let c = next_stamp();
        assert!(a < b && b < c);
    }
}
