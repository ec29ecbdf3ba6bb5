//! Error types for the page2anki library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Page2AnkiError`]: **Fatal**: the flow cannot start at all (page file
//!   missing, download failed, configuration unreadable). Returned as
//!   `Err(Page2AnkiError)` from input resolution and configuration handling.
//!
//! * [`RpcError`]: a single AnkiConnect call was rejected. The submission
//!   orchestrator turns these into a [`crate::submit::SubmissionOutcome`];
//!   they never escape `submit` as errors.
//!
//! * [`MediaError`]: **Non-fatal**: the page image could not be fetched or
//!   stored. Submission continues and embeds the original image URL instead.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the page2anki library.
#[derive(Debug, Error)]
pub enum Page2AnkiError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("HTML file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The settings file could not be read, parsed or written.
    #[error("Settings store '{path}' failed: {reason}")]
    ConfigStore { path: PathBuf, reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A rejected AnkiConnect call.
///
/// Exactly one of these is produced per failed `invoke`; nothing is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// The request never produced a response (connection refused, reset, DNS).
    #[error("Failed to connect to AnkiConnect: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("AnkiConnect request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response body was not the expected `{result, error}` JSON.
    #[error("Invalid response from AnkiConnect: {0}")]
    InvalidResponse(String),

    /// The service answered with a non-null `error` field.
    ///
    /// Displays the remote message verbatim so callers can match on it.
    #[error("{0}")]
    Remote(String),
}

/// Failure while turning a page image into an Anki media file.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The image request failed before a response arrived.
    #[error("Failed to fetch image '{url}': {reason}")]
    Network { url: String, reason: String },

    /// The image server answered outside the 2xx range.
    #[error("Failed to fetch image '{url}': HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The image request exceeded the configured timeout.
    #[error("Timed out fetching image '{url}' after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// A `data:` URL without a `,` separating header and payload.
    #[error("Malformed data URL")]
    InvalidDataUrl,

    /// `storeMediaFile` was rejected.
    #[error("Failed to store media file: {0}")]
    Store(#[from] RpcError),
}
