//! Long-term memory sync against an external categorized memory service.
//!
//! Entries are pushed as normalized plain text with a fixed extraction
//! policy; notification features later pull back category-scoped snippets.
//! The whole capability is best-effort: the lifecycle never blocks a save on
//! this service, and absence of credentials selects the no-op store.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

const DEFAULT_API_BASE: &str = "https://api.mem0.ai";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 20_000;

/// Extraction policy applied to everything synced for a user.
const EXTRACTION_INSTRUCTIONS: &str = "Extract user preferences, goals, habits, completed \
     milestones, and significant life events. Exclude casual greetings, fleeting thoughts, \
     and generic formatting. Focus on recurring patterns and actionable data.";

/// Categories registered with the memory service project.
pub const MEMORY_CATEGORIES: [(&str, &str); 4] = [
    ("goals", "The user's long term aims, objectives, and desired outcomes."),
    (
        "habits",
        "Recurring routines, behaviors, or automatic actions described by the user.",
    ),
    ("preferences", "User likes, dislikes, and personal choices."),
    (
        "personal_history",
        "General facts about the user's life, past events, relationships, and identity.",
    ),
];

/// Similarity floor for category fetches; low on purpose so a category pull
/// returns everything filed under it.
const CATEGORY_SEARCH_THRESHOLD: f64 = 0.1;

#[derive(Debug, Error)]
/// Errors from memory service calls. Callers log these and move on.
pub enum MemoryError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("memory service returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
/// Capability contract for the categorized memory service.
pub trait MemoryStore: Send + Sync {
    /// Pushes finalized plain text for an entry.
    async fn sync(&self, user_id: &str, text: &str) -> Result<(), MemoryError>;

    /// Free-text memory search scoped to one user.
    async fn search(&self, user_id: &str, query: &str) -> Result<Vec<String>, MemoryError>;

    /// Fetches memories filed under the given categories.
    async fn search_by_category(
        &self,
        user_id: &str,
        categories: &[&str],
    ) -> Result<Vec<String>, MemoryError>;

    /// Registers the MyArc category set with the service project.
    async fn initialize_project(&self) -> Result<(), MemoryError>;
}

/// Inert store used when no memory service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMemoryStore;

#[async_trait]
impl MemoryStore for NoopMemoryStore {
    async fn sync(&self, _user_id: &str, _text: &str) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn search(&self, _user_id: &str, _query: &str) -> Result<Vec<String>, MemoryError> {
        Ok(Vec::new())
    }

    async fn search_by_category(
        &self,
        _user_id: &str,
        _categories: &[&str],
    ) -> Result<Vec<String>, MemoryError> {
        Ok(Vec::new())
    }

    async fn initialize_project(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Configuration for the hosted memory service client.
pub struct MemoryClientConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

impl MemoryClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
/// REST client for the hosted memory service.
pub struct MemoryClient {
    client: reqwest::Client,
    config: MemoryClientConfig,
}

impl MemoryClient {
    pub fn new(config: MemoryClientConfig) -> Result<Self, MemoryError> {
        if config.api_key.trim().is_empty() {
            return Err(MemoryError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, MemoryError> {
        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(MemoryError::HttpStatus {
                status: status.as_u16(),
                body: raw,
            });
        }

        serde_json::from_str(&raw)
            .map_err(|error| MemoryError::InvalidResponse(error.to_string()))
    }

    async fn run_search(&self, body: Value) -> Result<Vec<String>, MemoryError> {
        let response = self.post_json("/v1/memories/search/", &body).await?;
        Ok(extract_memory_strings(&response))
    }
}

/// Plucks `memory` strings out of either a bare array response or a
/// `{"results": [...]}` wrapper.
fn extract_memory_strings(response: &Value) -> Vec<String> {
    let items = response
        .as_array()
        .or_else(|| response.get("results").and_then(Value::as_array));

    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("memory").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl MemoryStore for MemoryClient {
    async fn sync(&self, user_id: &str, text: &str) -> Result<(), MemoryError> {
        let body = json!({
            "messages": [{ "role": "user", "content": text }],
            "user_id": user_id,
            "custom_instructions": EXTRACTION_INSTRUCTIONS,
        });
        self.post_json("/v1/memories/", &body).await?;
        info!(%user_id, "synced entry text to memory service");
        Ok(())
    }

    async fn search(&self, user_id: &str, query: &str) -> Result<Vec<String>, MemoryError> {
        self.run_search(json!({ "query": query, "user_id": user_id }))
            .await
    }

    async fn search_by_category(
        &self,
        user_id: &str,
        categories: &[&str],
    ) -> Result<Vec<String>, MemoryError> {
        self.run_search(json!({
            "query": "",
            "user_id": user_id,
            "categories": categories,
            "threshold": CATEGORY_SEARCH_THRESHOLD,
        }))
        .await
    }

    async fn initialize_project(&self) -> Result<(), MemoryError> {
        let custom_categories: Vec<Value> = MEMORY_CATEGORIES
            .iter()
            .map(|(name, description)| json!({ (*name): description }))
            .collect();
        let body = json!({
            "custom_categories": custom_categories,
            "custom_instructions": EXTRACTION_INSTRUCTIONS,
        });
        self.post_json("/v1/project/", &body).await?;
        info!("memory service project initialized with categories");
        Ok(())
    }
}
