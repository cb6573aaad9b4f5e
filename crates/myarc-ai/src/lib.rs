//! AI provider surface for MyArc: entry analysis, embeddings, and nudge text.
mod embedding;
mod google;
mod types;

pub use embedding::cosine_similarity;
pub use google::{GoogleAiClient, GoogleAiConfig};
pub use types::{
    AiError, DailyArc, DisabledInsightClient, EntryAnalysis, InsightClient, Short, ShortKind,
    EMBEDDING_DIMENSIONS, EMBEDDING_INPUT_MAX_CHARS,
};
