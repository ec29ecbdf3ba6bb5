//! The add-card flow: usability check → optional preview → submission →
//! one notification.
//!
//! A [`Session`] owns the active [`Configuration`] snapshot for the lifetime of
//! the process. The only way it changes is through [`Configuration::save`],
//! which the flow calls when the user confirms the preview with a different
//! fast-add preference.

use crate::config::Configuration;
use crate::content::ContentRecord;
use crate::interaction::{NoticeKind, Notifier, PreviewDecision, PreviewDialog};
use crate::pipeline::media::MediaSource;
use crate::rpc::AnkiTransport;
use crate::store::ConfigStore;
use crate::submit::{SubmissionOutcome, Submitter};
use tracing::{debug, info, warn};

pub const EXTRACTION_EMPTY_MESSAGE: &str = "Could not extract content from page";

/// How the user asked for the card to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMode {
    /// Show the preview first, unless fast-add is enabled.
    #[default]
    Preview,
    /// Never show the preview.
    Fast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Title or description missing; nothing was sent.
    ExtractionEmpty,
    /// The user dismissed the preview; nothing was sent.
    Cancelled,
    Submitted(SubmissionOutcome),
}

pub struct Session<'a, T, M> {
    config: Configuration,
    store: &'a mut dyn ConfigStore,
    submitter: Submitter<T, M>,
}

impl<'a, T, M> Session<'a, T, M>
where
    T: AnkiTransport,
    M: MediaSource,
{
    /// Load the configuration from `store` and start a session.
    pub fn new(store: &'a mut dyn ConfigStore, submitter: Submitter<T, M>) -> Self {
        let config = Configuration::load(&*store);
        Self {
            config,
            store,
            submitter,
        }
    }

    /// Start a session with an already loaded snapshot.
    pub fn with_config(config: Configuration, store: &'a mut dyn ConfigStore, submitter: Submitter<T, M>) -> Self {
        Self {
            config,
            store,
            submitter,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn submitter(&self) -> &Submitter<T, M> {
        &self.submitter
    }

    /// Run one add-card flow for `content`.
    ///
    /// Submission is never attempted for an unusable record. Every flow that
    /// is not cancelled raises exactly one notification.
    pub async fn process_page(
        &mut self,
        content: &ContentRecord,
        mode: AddMode,
        preview: &dyn PreviewDialog,
        notifier: &dyn Notifier,
    ) -> WorkflowOutcome {
        if !content.is_usable() {
            info!("Nothing to submit: title or description missing");
            notifier.notify(EXTRACTION_EMPTY_MESSAGE, NoticeKind::Error);
            return WorkflowOutcome::ExtractionEmpty;
        }

        let skip_preview = mode == AddMode::Fast || self.config.fast_add_enabled;
        if skip_preview {
            debug!("Preview skipped ({:?}, fast-add {})", mode, self.config.fast_add_enabled);
        } else {
            match preview.review(content, &self.config) {
                PreviewDecision::Cancelled => {
                    info!("Preview cancelled");
                    return WorkflowOutcome::Cancelled;
                }
                PreviewDecision::Confirmed { fast_add } => self.remember_fast_add(fast_add),
            }
        }

        let outcome = self.submitter.submit(content, &self.config).await;
        let kind = if outcome.is_success() {
            NoticeKind::Success
        } else {
            NoticeKind::Error
        };
        notifier.notify(&outcome.message(), kind);
        WorkflowOutcome::Submitted(outcome)
    }

    fn remember_fast_add(&mut self, fast_add: bool) {
        if fast_add == self.config.fast_add_enabled {
            return;
        }
        let next = Configuration {
            fast_add_enabled: fast_add,
            ..self.config.clone()
        };
        match Configuration::save(next, &mut *self.store) {
            Ok(saved) => {
                info!("Fast add {}", if fast_add { "enabled" } else { "disabled" });
                self.config = saved;
            }
            Err(e) => warn!("Could not save fast-add preference: {}", e),
        }
    }
}
