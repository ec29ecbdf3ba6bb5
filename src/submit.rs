//! Submission orchestrator: one [`ContentRecord`] → one AnkiConnect note.
//!
//! Steps run strictly in sequence, each awaited before the next:
//!
//! 1. `version` (reachability; failure → [`SubmissionOutcome::ConnectionFailed`])
//! 2. `deckNames`, then `createDeck` when the target deck is missing
//! 3. `modelFieldNames` for the target template
//! 4. media ingestion for the first image (non-fatal)
//! 5. field composition
//! 6. `addNote`
//!
//! Any rejection aborts the remaining steps. `addNote` is either never called
//! or its single result decides the outcome.

use crate::config::Configuration;
use crate::content::ContentRecord;
use crate::error::{MediaError, RpcError};
use crate::pipeline::compose::compose;
use crate::pipeline::media::{data_url_payload, media_filename, next_stamp, MediaSource};
use crate::rpc::{self, AnkiTransport, NewNote, NoteOptions};
use chrono::Local;
use tracing::{debug, info, warn};

/// Tag attached to every note this crate creates.
pub const PROVENANCE_TAG: &str = "LearnableMeta";

/// Terminal result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success { note_id: u64 },
    DuplicateRejected,
    ConnectionFailed { reason: String },
    ProtocolError { reason: String },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// User-facing notification text.
    pub fn message(&self) -> String {
        match self {
            Self::Success { .. } => "Card added to Anki successfully!".to_string(),
            Self::DuplicateRejected => {
                "Error: Card already exists. Enable \"Allow Duplicates\" in settings.".to_string()
            }
            Self::ConnectionFailed { reason } | Self::ProtocolError { reason } => {
                format!("Error: {reason}")
            }
        }
    }
}

/// Whether a remote rejection means "this note already exists".
///
/// AnkiConnect reports duplicates only as human-readable text, so this is a
/// substring match.
pub fn is_duplicate_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("duplicate")
}

fn classify(err: RpcError) -> SubmissionOutcome {
    let reason = err.to_string();
    if is_duplicate_message(&reason) {
        SubmissionOutcome::DuplicateRejected
    } else {
        SubmissionOutcome::ProtocolError { reason }
    }
}

/// Drives the submission sequence over a transport and a media source.
pub struct Submitter<T, M> {
    transport: T,
    media: M,
}

impl<T, M> Submitter<T, M>
where
    T: AnkiTransport,
    M: MediaSource,
{
    pub fn new(transport: T, media: M) -> Self {
        Self { transport, media }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the full sequence for `content` against `config`.
    pub async fn submit(&self, content: &ContentRecord, config: &Configuration) -> SubmissionOutcome {
        let t: &dyn AnkiTransport = &self.transport;

        match rpc::version(t).await {
            Ok(v) => debug!("AnkiConnect version {}", v),
            Err(e) => {
                warn!("AnkiConnect unreachable: {}", e);
                return SubmissionOutcome::ConnectionFailed {
                    reason: e.to_string(),
                };
            }
        }

        if let Err(e) = self.ensure_deck(&config.deck_name).await {
            return classify(e);
        }

        let fields = match rpc::model_field_names(t, &config.template_name).await {
            Ok(fields) => fields,
            Err(e) => return classify(e),
        };

        let stored_media = match content.primary_image() {
            Some(url) => match self.ingest_media(url).await {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!("Image not stored, embedding original URL instead: {}", e);
                    None
                }
            },
            None => None,
        };

        let Some(fields) = compose(content, stored_media.as_deref(), config, &fields, Local::now()) else {
            return SubmissionOutcome::ProtocolError {
                reason: format!("note type '{}' has no fields", config.template_name),
            };
        };

        let note = NewNote {
            deck_name: config.deck_name.clone(),
            model_name: config.template_name.clone(),
            fields,
            tags: vec![PROVENANCE_TAG.to_string()],
            options: NoteOptions {
                allow_duplicate: config.allow_duplicates,
            },
        };

        match rpc::add_note(t, &note).await {
            Ok(note_id) => {
                info!("Added note {} to deck '{}'", note_id, config.deck_name);
                SubmissionOutcome::Success { note_id }
            }
            Err(e) => classify(e),
        }
    }

    async fn ensure_deck(&self, deck: &str) -> Result<(), RpcError> {
        let decks = rpc::deck_names(&self.transport).await?;
        if !decks.iter().any(|d| d == deck) {
            info!("Creating deck '{}'", deck);
            rpc::create_deck(&self.transport, deck).await?;
        }
        Ok(())
    }

    /// Fetch `url`, store it in the media folder, and return the stored name.
    async fn ingest_media(&self, url: &str) -> Result<String, MediaError> {
        let filename = media_filename(url, next_stamp());
        let data_url = self.media.fetch_as_base64(url).await?;
        let payload = data_url_payload(&data_url)?;
        let stored = rpc::store_media_file(&self.transport, &filename, &payload).await?;
        debug!("Stored image as {}", filename);
        Ok(if stored.is_empty() { filename } else { stored })
    }
}
