//! User-facing collaborators of the add-card flow.
//!
//! The library never talks to a terminal or a window itself. Instead
//! [`crate::workflow::process_page`] is handed a [`PreviewDialog`] to ask the
//! user whether to go ahead, and a [`Notifier`] to report the single terminal
//! result of the flow.
//!
//! # Example
//!
//! ```rust
//! use page2anki::interaction::{NoticeKind, Notifier};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Collecting {
//!     seen: Mutex<Vec<String>>,
//! }
//!
//! impl Notifier for Collecting {
//!     fn notify(&self, message: &str, _kind: NoticeKind) {
//!         self.seen.lock().unwrap().push(message.to_string());
//!     }
//! }
//!
//! let n = Collecting::default();
//! n.notify("Card added to Anki successfully!", NoticeKind::Success);
//! assert_eq!(n.seen.lock().unwrap().len(), 1);
//! ```

use crate::config::Configuration;
use crate::content::ContentRecord;

/// What the user decided in the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewDecision {
    /// Go ahead. `fast_add` is the (possibly changed) preference to skip the
    /// preview next time.
    Confirmed { fast_add: bool },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Shows the extracted content and asks for confirmation.
///
/// Called at most once per flow, before any network traffic.
pub trait PreviewDialog: Send + Sync {
    fn review(&self, content: &ContentRecord, config: &Configuration) -> PreviewDecision;
}

/// Receives the one notification a flow produces.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NoticeKind) {
        let _ = (message, kind);
    }
}

/// Confirms every preview without changing the fast-add preference.
pub struct AutoConfirm;

impl PreviewDialog for AutoConfirm {
    fn review(&self, _content: &ContentRecord, config: &Configuration) -> PreviewDecision {
        PreviewDecision::Confirmed {
            fast_add: config.fast_add_enabled,
        }
    }
}

/// Drops every notification.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}

/// Shown in the preview when the service will reject duplicates.
pub const DUPLICATE_PROTECTION_NOTICE: &str =
    "Duplicate protection is on: a card that already exists will be rejected.";

/// Plain-text preview of `content` as it will be submitted.
pub fn preview_text(content: &ContentRecord, config: &Configuration) -> String {
    let mut out = String::new();
    out.push_str(&format!("Title:       {}\n", content.title));
    out.push_str(&format!("Description: {}\n", content.description));
    match content.primary_image() {
        Some(url) => out.push_str(&format!("Image:       {url}\n")),
        None => out.push_str("Image:       (none)\n"),
    }
    out.push_str(&format!(
        "Deck:        {}  (note type {})\n",
        config.deck_name, config.template_name
    ));
    if !config.allow_duplicates {
        out.push_str(DUPLICATE_PROTECTION_NOTICE);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ContentRecord {
        ContentRecord {
            title: "Topic X".into(),
            description: "Some description.".into(),
            images: vec!["https://cdn.example.com/a.jpg".into()],
            source_url: String::new(),
        }
    }

    #[test]
    fn auto_confirm_keeps_preference() {
        let config = Configuration::builder().fast_add_enabled(true).build().unwrap();
        assert_eq!(
            AutoConfirm.review(&record(), &config),
            PreviewDecision::Confirmed { fast_add: true }
        );
    }

    #[test]
    fn noop_notifier_does_not_panic() {
        NoopNotifier.notify("anything", NoticeKind::Error);
    }

    #[test]
    fn preview_lists_content() {
        let text = preview_text(&record(), &Configuration::default());
        assert!(text.contains("Topic X"));
        assert!(text.contains("https://cdn.example.com/a.jpg"));
        assert!(text.contains("LearnableMeta"));
        assert!(!text.contains(DUPLICATE_PROTECTION_NOTICE));
    }

    #[test]
    fn preview_warns_when_duplicates_are_rejected() {
        let config = Configuration::builder().allow_duplicates(false).build().unwrap();
        assert!(preview_text(&record(), &config).contains(DUPLICATE_PROTECTION_NOTICE));
    }
}
