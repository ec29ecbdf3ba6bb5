//! Note composition: [`ContentRecord`] → template field map.
//!
//! Pure and deterministic. The timestamp line, when enabled, uses the `now`
//! value handed in by the caller rather than reading the clock here.

use crate::config::Configuration;
use crate::content::ContentRecord;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;

/// Template field name → HTML fragment.
pub type NoteFieldMap = BTreeMap<String, String>;

pub const FRONT_FIELD: &str = "Front";
pub const BACK_FIELD: &str = "Back";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which template fields receive the front and back content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSelection<'a> {
    pub front: &'a str,
    pub back: &'a str,
}

/// Prefer fields literally named `Front`/`Back`, else the first two declared
/// fields. A single-field template gets both sides in that field.
///
/// Returns `None` for a template without fields.
pub fn select_fields(fields: &[String]) -> Option<FieldSelection<'_>> {
    let front = fields
        .iter()
        .find(|f| f.as_str() == FRONT_FIELD)
        .or_else(|| fields.first())?;
    let back = fields
        .iter()
        .find(|f| f.as_str() == BACK_FIELD)
        .or_else(|| fields.get(1))
        .unwrap_or(front);
    Some(FieldSelection { front, back })
}

/// Build the note fields for `content`.
///
/// `media_filename` is the name the image was stored under, if storing
/// succeeded. When front and back resolve to the same field, the back
/// content wins.
pub fn compose(
    content: &ContentRecord,
    media_filename: Option<&str>,
    config: &Configuration,
    fields: &[String],
    now: DateTime<Local>,
) -> Option<NoteFieldMap> {
    let selection = select_fields(fields)?;

    let mut map = NoteFieldMap::new();
    map.insert(selection.front.to_string(), front_html(content, media_filename));
    map.insert(
        selection.back.to_string(),
        back_html(content, config.add_timestamp.then_some(now)),
    );
    Some(map)
}

fn front_html(content: &ContentRecord, media_filename: Option<&str>) -> String {
    match media_filename.or(content.primary_image()) {
        Some(src) => format!("<img src=\"{}\">", escape_html(src)),
        None => escape_html(&content.title),
    }
}

fn back_html(content: &ContentRecord, stamped_at: Option<DateTime<Local>>) -> String {
    let mut back = format!(
        "<b>{}</b><br><br>{}",
        escape_html(&content.title.to_uppercase()),
        escape_html(&content.description)
    );
    if let Some(at) = stamped_at {
        back.push_str(&format!("\n\n[{}]", at.format(TIMESTAMP_FORMAT)));
    }
    back
}

/// Escape `& < > "` for insertion into note HTML.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
