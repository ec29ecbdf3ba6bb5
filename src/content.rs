//! The unit of content extracted from one page.

use serde::{Deserialize, Serialize};

/// Title, description and candidate images pulled from a page.
///
/// Built fresh by [`crate::pipeline::extract::extract`] and never mutated
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub title: String,
    pub description: String,
    /// Absolute image URLs in document order. May be empty.
    pub images: Vec<String>,
    pub source_url: String,
}

impl ContentRecord {
    /// A record can be submitted only when both title and description are present.
    pub fn is_usable(&self) -> bool {
        !self.title.is_empty() && !self.description.is_empty()
    }

    /// The image that ends up on the card, if any.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}
