//! Foundational low-level utilities shared across MyArc crates.
//!
//! Provides unix-time helpers used by staleness sweeps and entry timestamps,
//! plus the rich-text normalizer that derives previews and AI-ingestible text.

pub mod normalize;
pub mod time_utils;

pub use normalize::{embedding_input, plain_text, preview, sanitize_for_ai, PREVIEW_MAX_CHARS};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_stale_unix_ms};
