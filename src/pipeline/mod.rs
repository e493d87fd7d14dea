//! Stages at the edges of a conversion.
//!
//! ```text
//! input ──▶ registry / converter ──▶ renderer ──▶ encode
//! (path/URL)        (HTML)           (surface)    (PNG data URL)
//! ```
//!
//! 1. [`input`]: load a user-supplied path or URL as a [`crate::SourceFile`]
//! 2. [`encode`]: PNG-encode a captured surface into a data URL; runs in
//!    `spawn_blocking` because compression is CPU-bound

pub mod encode;
pub mod input;
