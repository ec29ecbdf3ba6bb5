//! Pipeline stages for page-to-note conversion.
//!
//! Each submodule implements exactly one step, so every stage can be tested
//! on its own and the network-facing ones can be swapped for fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ media ──▶ compose
//! (URL/path)  (DOM)     (base64)   (fields)
//! ```
//!
//! 1. [`input`]: load the page markup from a file or URL and record the
//!    URL it lives at
//! 2. [`extract`]: title, description and image fallback chains, built on
//!    the traversal helpers in [`dom`]
//! 3. [`media`]: fetch the first image as a base64 data URL and name the
//!    stored media file
//! 4. [`compose`]: map the record onto the note type's fields; pure

pub mod compose;
pub mod dom;
pub mod extract;
pub mod input;
pub mod media;
