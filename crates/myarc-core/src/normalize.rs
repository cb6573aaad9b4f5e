//! Rich-text normalization for previews and AI-bound text.
//!
//! Entry bodies are stored as encrypted rich text (HTML produced by the
//! editor). Everything derived from them — list previews, embedding input,
//! memory-sync payloads — goes through the plain-text rendering here first.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum preview length, counted in Unicode code points.
pub const PREVIEW_MAX_CHARS: usize = 200;

fn markup_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup tag pattern is valid"))
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"&[^;]+;").expect("entity pattern is valid"))
}

/// Strips markup tags, collapses HTML entities to single spaces, and trims.
pub fn plain_text(rich_text: &str) -> String {
    let without_tags = markup_tag_pattern().replace_all(rich_text, "");
    let without_entities = entity_pattern().replace_all(&without_tags, " ");
    without_entities.trim().to_string()
}

/// Derives the stored preview: the first [`PREVIEW_MAX_CHARS`] code points of
/// the plain-text rendering. Truncation is not word-boundary aware.
pub fn preview(rich_text: &str) -> String {
    plain_text(rich_text).chars().take(PREVIEW_MAX_CHARS).collect()
}

/// Builds the text fed to the embedding model for an entry.
pub fn embedding_input(title: &str, rich_text: &str) -> String {
    format!("{}. {}", title, plain_text(rich_text))
}

/// Normalizes entry text before it leaves the process for an AI service.
/// Same rendering as [`plain_text`]; kept as a named seam so outbound
/// sanitation can tighten independently of preview derivation.
pub fn sanitize_for_ai(rich_text: &str) -> String {
    plain_text(rich_text)
}
