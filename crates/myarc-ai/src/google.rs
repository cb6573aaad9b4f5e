use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::types::{
    AiError, EntryAnalysis, InsightClient, EMBEDDING_DIMENSIONS, EMBEDDING_INPUT_MAX_CHARS,
};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_ANALYSIS_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
/// Configuration for the Google Generative Language client.
pub struct GoogleAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub analysis_model: String,
    pub embedding_model: String,
    pub request_timeout_ms: u64,
}

impl GoogleAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
/// Client for entry analysis, embeddings, and nudge-text generation.
pub struct GoogleAiClient {
    client: reqwest::Client,
    config: GoogleAiConfig,
}

impl GoogleAiClient {
    pub fn new(config: GoogleAiConfig) -> Result<Self, AiError> {
        if config.api_key.trim().is_empty() {
            return Err(AiError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn generate_content_url(&self, model: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{base}/models/{model}:generateContent")
    }

    fn embed_content_url(&self, model: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{base}/models/{model}:embedContent")
    }

    async fn generate_content(&self, prompt: &str) -> Result<String, AiError> {
        let url = self.generate_content_url(&self.config.analysis_model);
        let body = build_generate_content_body(prompt);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(AiError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }

        parse_generate_content_text(&raw)
    }

    async fn embed_content(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let url = self.embed_content_url(&self.config.embedding_model);
        let body = build_embed_content_body(&self.config.embedding_model, text);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(AiError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }

        parse_embed_content_values(&raw)
    }
}

#[async_trait]
impl InsightClient for GoogleAiClient {
    async fn analyze_entry(&self, text: &str) -> Option<EntryAnalysis> {
        let prompt = build_analysis_prompt(text);
        let raw = match self.generate_content(&prompt).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "entry analysis call failed");
                return None;
            }
        };

        let clean = strip_json_fences(&raw);
        if clean.is_empty() {
            return None;
        }

        match serde_json::from_str::<EntryAnalysis>(clean) {
            Ok(analysis) => Some(analysis),
            Err(error) => {
                warn!(%error, "entry analysis response was not valid JSON");
                None
            }
        }
    }

    async fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        let truncated = truncate_embedding_input(text);
        match self.embed_content(&truncated).await {
            Ok(values) => Some(values),
            Err(error) => {
                warn!(%error, "embedding call failed");
                None
            }
        }
    }

    async fn generate_text(&self, prompt: &str) -> Option<String> {
        match self.generate_content(prompt).await {
            Ok(text) => {
                let trimmed = text.trim().to_string();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            Err(error) => {
                warn!(%error, "text generation call failed");
                None
            }
        }
    }
}

fn build_analysis_prompt(entry_text: &str) -> String {
    format!(
        r#"You are an AI assistant for a journaling app called "MyArc".
Analyze the following journal entry and extract:
1. "Shorts": Distinct actionable items, realizations, or goals.
2. "Daily Arc": A single, small, suggested action to build momentum for today based on this entry.
3. "Sentiment": The overall emotional tone (Positive, Neutral, Negative).
4. "Tags": 3-5 relevant keywords.

Return the result as a JSON object with this structure:
{{
  "shorts": [{{ "type": "action" | "realization" | "goal", "content": "..." }}],
  "dailyArc": {{ "suggestedAction": "..." }},
  "sentiment": "...",
  "tags": ["..."]
}}

Entry:
"{entry_text}"
"#
    )
}

fn build_generate_content_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
    })
}

fn build_embed_content_body(model: &str, text: &str) -> Value {
    json!({
        "model": format!("models/{model}"),
        "content": { "parts": [{ "text": text }] },
        "outputDimensionality": EMBEDDING_DIMENSIONS,
    })
}

fn parse_generate_content_text(raw: &str) -> Result<String, AiError> {
    let value: Value = serde_json::from_str(raw)?;
    let parts = value
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AiError::InvalidResponse("generateContent response missing candidates".to_string())
        })?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");
    Ok(text)
}

fn parse_embed_content_values(raw: &str) -> Result<Vec<f32>, AiError> {
    let value: Value = serde_json::from_str(raw)?;
    // Single-request responses carry `embedding`; batch-shaped responses
    // carry `embeddings[0]`.
    let values = value
        .get("embedding")
        .and_then(|embedding| embedding.get("values"))
        .or_else(|| {
            value
                .get("embeddings")
                .and_then(|embeddings| embeddings.get(0))
                .and_then(|embedding| embedding.get("values"))
        })
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AiError::InvalidResponse("embedContent response missing embedding values".to_string())
        })?;

    Ok(values
        .iter()
        .filter_map(Value::as_f64)
        .map(|v| v as f32)
        .collect())
}

/// Bounds embedding input to the upstream model's accepted length.
fn truncate_embedding_input(text: &str) -> String {
    text.chars().take(EMBEDDING_INPUT_MAX_CHARS).collect()
}

/// Strips markdown code fences the model sometimes wraps JSON output in.
fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
