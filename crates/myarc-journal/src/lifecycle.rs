use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use myarc_ai::{cosine_similarity, InsightClient};
use myarc_assets::{
    new_asset_key, AssetError, AssetStore, AssetUrlScanner, ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES,
};
use myarc_core::normalize;
use myarc_crypto::{CodecError, ContentCodec};
use myarc_memory::MemoryStore;
use myarc_store::{EntryChanges, EntryListItem, EntryRecord, JournalDb, NewEntry, StoreError};

/// Tracked uploads older than this are orphans eligible for deletion.
pub const STALE_UPLOAD_THRESHOLD_MS: u64 = 24 * 60 * 60 * 1_000;

#[derive(Debug, Error)]
/// Errors surfaced by lifecycle operations. Auxiliary-step failures (asset
/// cleanup, embedding, memory sync) never appear here; they are logged and
/// swallowed.
pub enum EntryError {
    #[error("{0}")]
    Validation(String),
    #[error("entry not found")]
    NotFound,
    #[error("upload rejected: {0}")]
    InvalidUpload(String),
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
    #[error("content codec failure: {0}")]
    Codec(#[from] CodecError),
    #[error("object storage failure: {0}")]
    Asset(#[from] AssetError),
}

/// Caller-submitted fields for a create or update.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub entry_date_unix_ms: Option<u64>,
}

/// An entry as returned to callers: content is plaintext, embedding absent.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntryView {
    pub id: String,
    pub title: String,
    pub content: String,
    pub preview: String,
    pub tags: Vec<String>,
    pub entry_date_unix_ms: u64,
    pub sentiment: Option<String>,
    pub ai_analysis: Option<Value>,
    pub created_unix_ms: u64,
    pub updated_unix_ms: u64,
}

impl EntryView {
    fn from_record(record: EntryRecord, plaintext_content: String) -> Self {
        Self {
            id: record.id,
            title: record.title,
            content: plaintext_content,
            preview: record.preview,
            tags: record.tags,
            entry_date_unix_ms: record.entry_date_unix_ms,
            sentiment: record.sentiment,
            ai_analysis: record.ai_analysis,
            created_unix_ms: record.created_unix_ms,
            updated_unix_ms: record.updated_unix_ms,
        }
    }
}

/// Per-save observability record. `persisted` is always true on the Ok path;
/// the other flags report whether the best-effort sub-steps completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub persisted: bool,
    pub embedding_updated: bool,
    pub assets_cleaned: bool,
}

/// Result of a successful create or update.
#[derive(Debug, Clone)]
pub struct SavedEntry {
    pub entry: EntryView,
    pub outcome: SaveOutcome,
}

/// Result of an asset upload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadedAsset {
    pub url: String,
    pub key: String,
}

/// Coordinates entry persistence across the primary store, object storage,
/// and the AI/memory capabilities.
#[derive(Clone)]
pub struct EntryLifecycle {
    db: JournalDb,
    codec: ContentCodec,
    assets: Arc<dyn AssetStore>,
    scanner: AssetUrlScanner,
    insight: Arc<dyn InsightClient>,
    memory: Arc<dyn MemoryStore>,
}

impl EntryLifecycle {
    pub fn new(
        db: JournalDb,
        codec: ContentCodec,
        assets: Arc<dyn AssetStore>,
        scanner: AssetUrlScanner,
        insight: Arc<dyn InsightClient>,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            db,
            codec,
            assets,
            scanner,
            insight,
            memory,
        }
    }

    fn validate_draft(draft: &EntryDraft) -> Result<(), EntryError> {
        if draft.title.trim().is_empty() || draft.content.trim().is_empty() {
            return Err(EntryError::Validation(
                "title and content are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a new entry for `user_id`.
    pub async fn create_entry(
        &self,
        user_id: &str,
        draft: EntryDraft,
    ) -> Result<SavedEntry, EntryError> {
        Self::validate_draft(&draft)?;

        let result = self.create_entry_inner(user_id, &draft).await;
        // Uploads made during this editing session are resolved either way:
        // referenced keys stay, orphans go, tracking rows always clear.
        let assets_cleaned = self.reconcile_pending_uploads(user_id, &draft.content).await;

        let (record, embedding_updated) = result?;
        self.spawn_memory_sync(user_id, &draft.content);

        let outcome = SaveOutcome {
            persisted: true,
            embedding_updated,
            assets_cleaned,
        };
        info!(entry_id = %record.id, ?outcome, "entry created");

        Ok(SavedEntry {
            entry: EntryView::from_record(record, draft.content),
            outcome,
        })
    }

    async fn create_entry_inner(
        &self,
        user_id: &str,
        draft: &EntryDraft,
    ) -> Result<(EntryRecord, bool), EntryError> {
        let preview = normalize::preview(&draft.content);
        let encrypted = self.codec.encrypt(&draft.content)?;

        let analysis = self
            .insight
            .analyze_entry(&normalize::sanitize_for_ai(&draft.content))
            .await;
        let sentiment = analysis
            .as_ref()
            .and_then(|analysis| analysis.sentiment.clone());
        let ai_analysis = match analysis {
            Some(analysis) => match serde_json::to_value(&analysis) {
                Ok(value) => Some(value),
                Err(error) => {
                    warn!(%error, "failed to serialize entry analysis; dropping it");
                    None
                }
            },
            None => None,
        };

        let record = self.db.insert_entry(NewEntry {
            user_id: user_id.to_string(),
            title: draft.title.clone(),
            content: encrypted,
            preview,
            tags: draft.tags.clone(),
            entry_date_unix_ms: draft.entry_date_unix_ms,
            sentiment,
            ai_analysis,
        })?;

        let embedding_updated = self
            .refresh_embedding(user_id, &record.id, &draft.title, &draft.content)
            .await;

        Ok((record, embedding_updated))
    }

    /// Updates an owner's entry, diffing referenced assets against the prior
    /// content and cleaning up what the new content no longer uses.
    pub async fn update_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        draft: EntryDraft,
    ) -> Result<SavedEntry, EntryError> {
        Self::validate_draft(&draft)?;

        let result = self.update_entry_inner(user_id, entry_id, &draft).await;
        // Runs even when the load or persist above failed; see module docs.
        let pending_cleared = self.reconcile_pending_uploads(user_id, &draft.content).await;

        let (record, embedding_updated, diff_cleaned) = result?;
        self.spawn_memory_sync(user_id, &draft.content);

        let outcome = SaveOutcome {
            persisted: true,
            embedding_updated,
            assets_cleaned: diff_cleaned && pending_cleared,
        };
        info!(entry_id = %record.id, ?outcome, "entry updated");

        Ok(SavedEntry {
            entry: EntryView::from_record(record, draft.content),
            outcome,
        })
    }

    async fn update_entry_inner(
        &self,
        user_id: &str,
        entry_id: &str,
        draft: &EntryDraft,
    ) -> Result<(EntryRecord, bool, bool), EntryError> {
        let existing = self
            .db
            .find_entry(entry_id, user_id)?
            .ok_or(EntryError::NotFound)?;

        let diff_cleaned = self
            .cleanup_removed_assets(&existing.content, &draft.content)
            .await;

        let encrypted = self.codec.encrypt(&draft.content)?;
        let preview = normalize::preview(&draft.content);

        let record = self
            .db
            .update_entry(
                entry_id,
                user_id,
                EntryChanges {
                    title: draft.title.clone(),
                    content: encrypted,
                    preview,
                    tags: draft.tags.clone(),
                },
            )?
            .ok_or(EntryError::NotFound)?;

        let embedding_updated = self
            .refresh_embedding(user_id, entry_id, &draft.title, &draft.content)
            .await;

        Ok((record, embedding_updated, diff_cleaned))
    }

    /// Deletes an owner's entry and best-effort removes its referenced
    /// assets. The document removal is authoritative; cleanup failures do
    /// not roll it back.
    pub async fn delete_entry(&self, user_id: &str, entry_id: &str) -> Result<(), EntryError> {
        let removed = self
            .db
            .delete_entry(entry_id, user_id)?
            .ok_or(EntryError::NotFound)?;

        match self.codec.decrypt(&removed.content) {
            Ok(plaintext) => {
                let keys = self.scanner.referenced_keys(&plaintext);
                if !keys.is_empty() {
                    if let Err(error) = self.assets.delete_many(&keys).await {
                        warn!(%error, entry_id, "failed to delete assets for removed entry");
                    }
                }
            }
            Err(error) => {
                warn!(%error, entry_id, "failed to decrypt removed entry for asset cleanup");
            }
        }

        info!(entry_id, "entry deleted");
        Ok(())
    }

    /// Loads an owner's entry with decrypted content.
    pub fn get_entry(&self, user_id: &str, entry_id: &str) -> Result<EntryView, EntryError> {
        let record = self
            .db
            .find_entry(entry_id, user_id)?
            .ok_or(EntryError::NotFound)?;
        let plaintext = self.codec.decrypt(&record.content)?;
        Ok(EntryView::from_record(record, plaintext))
    }

    /// Lists an owner's entries, optionally keyword-filtered.
    pub fn list_entries(
        &self,
        user_id: &str,
        keyword: Option<&str>,
    ) -> Result<Vec<EntryListItem>, EntryError> {
        Ok(self.db.list_entries(user_id, keyword)?)
    }

    /// Ranks the owner's other entries by embedding similarity against the
    /// given reference entry. Entries without embeddings are skipped; a
    /// reference without an embedding yields an empty result.
    pub fn similar_entries(
        &self,
        user_id: &str,
        entry_id: &str,
        limit: usize,
    ) -> Result<Vec<EntryListItem>, EntryError> {
        let Some(reference) = self.db.embedding_for_entry(entry_id, user_id)? else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(String, f32)> = self
            .db
            .embeddings_for_owner(user_id)?
            .into_iter()
            .filter(|(id, _)| id != entry_id)
            .map(|(id, embedding)| (id, cosine_similarity(&reference, &embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let items = self.db.list_entries(user_id, None)?;
        let ranked = scored
            .into_iter()
            .filter_map(|(id, _)| items.iter().find(|item| item.id == id).cloned())
            .collect();
        Ok(ranked)
    }

    /// Stores an uploaded image and tracks it as pending until a save
    /// resolves it.
    pub async fn upload_asset(
        &self,
        user_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedAsset, EntryError> {
        if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
            return Err(EntryError::InvalidUpload(
                "invalid file type; only JPEG, PNG, GIF, and WebP are allowed".to_string(),
            ));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(EntryError::InvalidUpload(
                "file too large; maximum size is 3MB".to_string(),
            ));
        }

        let key = new_asset_key(file_name);
        let url = self.assets.upload(bytes, &key, content_type).await?;
        self.db.track_pending_upload(user_id, &key)?;

        Ok(UploadedAsset { url, key })
    }

    /// Sweeps tracked uploads older than `threshold_ms` across all owners:
    /// deletes their storage objects, then drops the tracking records.
    /// Records a concurrent save already cleared simply no longer count.
    pub async fn sweep_stale_uploads(&self, threshold_ms: u64) -> Result<usize, EntryError> {
        let cutoff = myarc_core::current_unix_timestamp_ms().saturating_sub(threshold_ms);
        let stale = self.db.stale_pending_uploads(cutoff)?;
        if stale.is_empty() {
            return Ok(0);
        }

        let keys: BTreeSet<String> = stale
            .iter()
            .map(|record| record.object_key.clone())
            .collect();
        self.assets.delete_many(&keys).await?;

        let ids: Vec<i64> = stale.iter().map(|record| record.id).collect();
        self.db.remove_pending_by_ids(&ids)?;

        info!(count = keys.len(), "swept stale pending uploads");
        Ok(keys.len())
    }

    /// Best-effort deletion of assets the new content no longer references.
    /// Returns false when any step was skipped due to a failure.
    async fn cleanup_removed_assets(&self, old_encrypted: &str, new_content: &str) -> bool {
        let old_plaintext = match self.codec.decrypt(old_encrypted) {
            Ok(plaintext) => plaintext,
            Err(error) => {
                warn!(%error, "failed to decrypt prior content; skipping asset diff");
                return false;
            }
        };

        let old_keys = self.scanner.referenced_keys(&old_plaintext);
        let new_keys = self.scanner.referenced_keys(new_content);
        let removed: BTreeSet<String> = old_keys.difference(&new_keys).cloned().collect();
        if removed.is_empty() {
            return true;
        }

        match self.assets.delete_many(&removed).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, count = removed.len(), "failed to delete removed assets");
                false
            }
        }
    }

    /// Best-effort reconciliation run after every save attempt, success or
    /// failure: deletes tracked uploads the saved content does not reference
    /// and clears all tracking rows for the owner.
    async fn reconcile_pending_uploads(&self, user_id: &str, new_content: &str) -> bool {
        let tracked = match self.db.pending_keys_for_owner(user_id) {
            Ok(tracked) => tracked,
            Err(error) => {
                warn!(%error, "failed to load pending uploads for reconciliation");
                return false;
            }
        };
        if tracked.is_empty() {
            return true;
        }

        let referenced = self.scanner.referenced_keys(new_content);
        let orphaned: BTreeSet<String> = tracked
            .into_iter()
            .filter(|key| !referenced.contains(key))
            .collect();

        let mut clean = true;
        if !orphaned.is_empty() {
            if let Err(error) = self.assets.delete_many(&orphaned).await {
                warn!(%error, count = orphaned.len(), "failed to delete orphaned uploads");
                clean = false;
            }
        }

        if let Err(error) = self.db.clear_pending_for_owner(user_id) {
            warn!(%error, "failed to clear pending upload records");
            clean = false;
        }
        clean
    }

    /// Recomputes and stores the embedding for an entry. Returns whether a
    /// fresh embedding was stored; on failure the previously stored vector
    /// is left untouched (accepted staleness window).
    async fn refresh_embedding(
        &self,
        user_id: &str,
        entry_id: &str,
        title: &str,
        content: &str,
    ) -> bool {
        let input = normalize::embedding_input(title, content);
        let Some(embedding) = self.insight.embed_text(&input).await else {
            return false;
        };

        match self.db.update_embedding(entry_id, user_id, &embedding) {
            Ok(stored) => stored,
            Err(error) => {
                warn!(%error, entry_id, "failed to store refreshed embedding");
                false
            }
        }
    }

    fn spawn_memory_sync(&self, user_id: &str, content: &str) {
        let memory = Arc::clone(&self.memory);
        let user_id = user_id.to_string();
        let text = normalize::sanitize_for_ai(content);
        tokio::spawn(async move {
            if let Err(error) = memory.sync(&user_id, &text).await {
                warn!(%error, "memory sync failed");
            }
        });
    }
}
