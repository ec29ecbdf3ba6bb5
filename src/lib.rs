//! # page2anki
//!
//! Turn a web page into an Anki flashcard through AnkiConnect.
//!
//! ## Why this crate?
//!
//! Study pages tend to follow one layout: a heading, a short explanation and
//! an illustrative image. Copying those into Anki by hand is slow. This crate
//! pulls the three pieces out of the page markup with a chain of increasingly
//! generic heuristics, then drives AnkiConnect's JSON-RPC interface to create
//! the deck if needed, store the image and add the note.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page (file or URL)
//!  │
//!  ├─ 1. Input    resolve local HTML file or download from URL
//!  ├─ 2. Extract  title / description / images via fallback chains
//!  ├─ 3. Preview  optional confirmation (skipped in fast-add mode)
//!  ├─ 4. Media    fetch first image → base64 → storeMediaFile (non-fatal)
//!  ├─ 5. Compose  Front / Back HTML for the note type's fields
//!  └─ 6. Submit   addNote, classified into one SubmissionOutcome
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use page2anki::{
//!     extract_html, AnkiConnectClient, Configuration, HttpMediaFetcher, Submitter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let html = std::fs::read_to_string("page.html")?;
//!     let content = extract_html(&html, "https://learnablemeta.com/maps/1");
//!
//!     let config = Configuration::default();
//!     let submitter = Submitter::new(
//!         AnkiConnectClient::from_config(&config)?,
//!         HttpMediaFetcher::from_config(&config)?,
//!     );
//!     let outcome = submitter.submit(&content, &config).await;
//!     println!("{}", outcome.message());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `page2anki` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! page2anki = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod content;
pub mod error;
pub mod interaction;
pub mod pipeline;
pub mod rpc;
pub mod store;
pub mod submit;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Configuration, ConfigurationBuilder};
pub use content::ContentRecord;
pub use error::{MediaError, Page2AnkiError, RpcError};
pub use interaction::{AutoConfirm, NoopNotifier, NoticeKind, Notifier, PreviewDecision, PreviewDialog};
pub use pipeline::compose::{compose, NoteFieldMap};
pub use pipeline::extract::{extract, extract_html, extract_with_options, ExtractOptions};
pub use pipeline::input::{load_page, PageSource};
pub use pipeline::media::{HttpMediaFetcher, MediaSource};
pub use rpc::{AnkiConnectClient, AnkiTransport};
pub use store::{ConfigStore, JsonFileStore, MemoryStore};
pub use submit::{SubmissionOutcome, Submitter};
pub use workflow::{AddMode, Session, WorkflowOutcome};
