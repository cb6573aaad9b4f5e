use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum characters of entry text sent to the embedding model.
pub const EMBEDDING_INPUT_MAX_CHARS: usize = 8_000;

/// Output dimensionality requested from the embedding model.
pub const EMBEDDING_DIMENSIONS: usize = 512;

#[derive(Debug, Error)]
/// Errors surfaced by AI provider calls before they are collapsed to `None`
/// at the capability boundary.
pub enum AiError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Kind of extracted short: actionable item, realization, or goal.
pub enum ShortKind {
    Action,
    Realization,
    Goal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A single extracted short from an entry.
pub struct Short {
    #[serde(rename = "type")]
    pub kind: ShortKind,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// The suggested momentum-building action for today.
pub struct DailyArc {
    pub suggested_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
/// Structured analysis of a journal entry as returned by the model.
pub struct EntryAnalysis {
    #[serde(default)]
    pub shorts: Vec<Short>,
    #[serde(default)]
    pub daily_arc: Option<DailyArc>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
/// Capability contract for AI-derived insight features.
///
/// Every method degrades to `None` rather than erroring: the lifecycle treats
/// `None` as "skip, keep the previous value". Implementations log failures
/// themselves.
pub trait InsightClient: Send + Sync {
    async fn analyze_entry(&self, text: &str) -> Option<EntryAnalysis>;
    async fn embed_text(&self, text: &str) -> Option<Vec<f32>>;
    async fn generate_text(&self, prompt: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Inert implementation used when no AI provider is configured.
pub struct DisabledInsightClient;

#[async_trait]
impl InsightClient for DisabledInsightClient {
    async fn analyze_entry(&self, _text: &str) -> Option<EntryAnalysis> {
        None
    }

    async fn embed_text(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }

    async fn generate_text(&self, _prompt: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_analysis_deserializes_model_payload() {
        let raw = r#"{
            "shorts": [
                { "type": "action", "content": "Email the landlord" },
                { "type": "goal", "content": "Run a 10k in June" }
            ],
            "dailyArc": { "suggestedAction": "Take a 10 minute walk" },
            "sentiment": "Positive",
            "tags": ["running", "apartment"]
        }"#;

        let analysis: EntryAnalysis = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(analysis.shorts.len(), 2);
        assert_eq!(analysis.shorts[0].kind, ShortKind::Action);
        assert_eq!(
            analysis.daily_arc.as_ref().map(|arc| arc.suggested_action.as_str()),
            Some("Take a 10 minute walk")
        );
        assert_eq!(analysis.sentiment.as_deref(), Some("Positive"));
        assert_eq!(analysis.tags, vec!["running", "apartment"]);
    }

    #[test]
    fn entry_analysis_tolerates_missing_fields() {
        let analysis: EntryAnalysis =
            serde_json::from_str(r#"{ "sentiment": "Neutral" }"#).expect("deserialize");
        assert!(analysis.shorts.is_empty());
        assert!(analysis.daily_arc.is_none());
        assert!(analysis.tags.is_empty());
    }
}
