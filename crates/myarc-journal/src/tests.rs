use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use myarc_ai::{DisabledInsightClient, EntryAnalysis, InsightClient};
use myarc_assets::{AssetError, AssetStore, AssetUrlScanner};
use myarc_crypto::ContentCodec;
use myarc_memory::NoopMemoryStore;
use myarc_store::{JournalDb, NewEntry, UserRecord};

use crate::lifecycle::{EntryDraft, EntryError, EntryLifecycle};
use crate::momentum::{run_momentum_nudges, LogNotifier, Notifier, NudgeStatus};
use crate::STALE_UPLOAD_THRESHOLD_MS;

const BASE_URL: &str = "https://myarc-media.s3.us-east-1.amazonaws.com/";

/// Asset store double that records every delete call.
#[derive(Default)]
struct RecordingAssetStore {
    deletes: Mutex<Vec<BTreeSet<String>>>,
    fail_deletes: bool,
}

impl RecordingAssetStore {
    fn failing() -> Self {
        Self {
            deletes: Mutex::new(Vec::new()),
            fail_deletes: true,
        }
    }

    fn recorded_deletes(&self) -> Vec<BTreeSet<String>> {
        self.deletes.lock().expect("lock").clone()
    }
}

#[async_trait]
impl AssetStore for RecordingAssetStore {
    fn public_base_url(&self) -> &str {
        BASE_URL
    }

    async fn upload(
        &self,
        _bytes: Vec<u8>,
        key: &str,
        _content_type: &str,
    ) -> Result<String, AssetError> {
        Ok(format!("{BASE_URL}{key}"))
    }

    async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<(), AssetError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.deletes.lock().expect("lock").push(keys.clone());
        if self.fail_deletes {
            return Err(AssetError::Storage("simulated outage".to_string()));
        }
        Ok(())
    }
}

/// Insight double whose embedding output can be swapped mid-test.
struct FakeInsightClient {
    embedding: Mutex<Option<Vec<f32>>>,
}

impl FakeInsightClient {
    fn with_embedding(values: Vec<f32>) -> Self {
        Self {
            embedding: Mutex::new(Some(values)),
        }
    }

    fn set_embedding(&self, values: Option<Vec<f32>>) {
        *self.embedding.lock().expect("lock") = values;
    }
}

#[async_trait]
impl InsightClient for FakeInsightClient {
    async fn analyze_entry(&self, _text: &str) -> Option<EntryAnalysis> {
        Some(EntryAnalysis {
            sentiment: Some("Positive".to_string()),
            tags: vec!["test".to_string()],
            ..EntryAnalysis::default()
        })
    }

    async fn embed_text(&self, _text: &str) -> Option<Vec<f32>> {
        self.embedding.lock().expect("lock").clone()
    }

    async fn generate_text(&self, _prompt: &str) -> Option<String> {
        Some("A gentle reminder to write.".to_string())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    db: JournalDb,
    assets: Arc<RecordingAssetStore>,
    insight: Arc<FakeInsightClient>,
    lifecycle: EntryLifecycle,
}

fn harness() -> Harness {
    harness_with_assets(RecordingAssetStore::default())
}

fn harness_with_assets(assets: RecordingAssetStore) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = JournalDb::new(dir.path().join("journal.db")).expect("open db");
    let assets = Arc::new(assets);
    let insight = Arc::new(FakeInsightClient::with_embedding(vec![1.0, 0.0]));
    let lifecycle = EntryLifecycle::new(
        db.clone(),
        ContentCodec::new("lifecycle-test-secret"),
        assets.clone() as Arc<dyn AssetStore>,
        AssetUrlScanner::new(BASE_URL).expect("scanner"),
        insight.clone() as Arc<dyn InsightClient>,
        Arc::new(NoopMemoryStore),
    );
    Harness {
        _dir: dir,
        db,
        assets,
        insight,
        lifecycle,
    }
}

fn seed_user(db: &JournalDb, email: &str) -> UserRecord {
    db.create_user(email, None, Some(email)).expect("create user")
}

fn draft(title: &str, content: &str) -> EntryDraft {
    EntryDraft {
        title: title.to_string(),
        content: content.to_string(),
        tags: Vec::new(),
        entry_date_unix_ms: None,
    }
}

fn image_content(key: &str) -> String {
    format!("<p>Hello <img src=\"{BASE_URL}{key}\">world</p>")
}

#[tokio::test]
async fn create_derives_preview_and_encrypts_content_at_rest() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");

    let saved = h
        .lifecycle
        .create_entry(&user.id, draft("Day 1", &image_content("entries/images/a.png")))
        .await
        .expect("create");

    assert_eq!(saved.entry.preview, "Hello world");
    assert!(saved.entry.content.contains("<img"));
    assert_eq!(saved.entry.sentiment.as_deref(), Some("Positive"));
    assert!(saved.outcome.persisted);
    assert!(saved.outcome.embedding_updated);

    // At rest the content is a hex iv:ciphertext token, never plaintext.
    let stored = h
        .db
        .find_entry(&saved.entry.id, &user.id)
        .expect("find")
        .expect("present");
    assert_ne!(stored.content, saved.entry.content);
    assert!(!stored.content.contains("<img"));
    assert!(stored.content.contains(':'));
}

#[tokio::test]
async fn create_retains_referenced_upload_and_clears_tracking() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    h.db
        .track_pending_upload(&user.id, "entries/images/a.png")
        .expect("track");

    h.lifecycle
        .create_entry(&user.id, draft("Day 1", &image_content("entries/images/a.png")))
        .await
        .expect("create");

    // The referenced upload survives; its tracking record does not.
    assert!(h.assets.recorded_deletes().is_empty());
    assert!(h.db.pending_keys_for_owner(&user.id).expect("keys").is_empty());
}

#[tokio::test]
async fn create_deletes_uploads_the_saved_content_never_referenced() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    h.db
        .track_pending_upload(&user.id, "entries/images/abandoned.png")
        .expect("track");

    h.lifecycle
        .create_entry(&user.id, draft("Day 1", "<p>no images today</p>"))
        .await
        .expect("create");

    let deletes = h.assets.recorded_deletes();
    assert_eq!(deletes.len(), 1);
    assert_eq!(
        deletes[0],
        ["entries/images/abandoned.png".to_string()].into()
    );
    assert!(h.db.pending_keys_for_owner(&user.id).expect("keys").is_empty());
}

#[tokio::test]
async fn update_deletes_removed_asset_exactly_once() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    let saved = h
        .lifecycle
        .create_entry(&user.id, draft("Day 1", &image_content("entries/images/a.png")))
        .await
        .expect("create");

    let updated = h
        .lifecycle
        .update_entry(&user.id, &saved.entry.id, draft("Day 1", "<p>image removed</p>"))
        .await
        .expect("update");
    assert!(updated.outcome.assets_cleaned);

    let deletes = h.assets.recorded_deletes();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0], ["entries/images/a.png".to_string()].into());

    // Saving the same content again finds nothing left to remove.
    h.lifecycle
        .update_entry(&user.id, &saved.entry.id, draft("Day 1", "<p>image removed</p>"))
        .await
        .expect("update");
    assert_eq!(h.assets.recorded_deletes().len(), 1);
}

#[tokio::test]
async fn update_with_unchanged_references_issues_no_deletions() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    let content = image_content("entries/images/a.png");
    let saved = h
        .lifecycle
        .create_entry(&user.id, draft("Day 1", &content))
        .await
        .expect("create");

    h.lifecycle
        .update_entry(&user.id, &saved.entry.id, draft("Day 1 edited", &content))
        .await
        .expect("update");

    assert!(h.assets.recorded_deletes().is_empty());
}

#[tokio::test]
async fn update_survives_asset_deletion_outage() {
    let h = harness_with_assets(RecordingAssetStore::failing());
    let user = seed_user(&h.db, "a@example.com");
    let saved = h
        .lifecycle
        .create_entry(&user.id, draft("Day 1", &image_content("entries/images/a.png")))
        .await
        .expect("create");

    let updated = h
        .lifecycle
        .update_entry(&user.id, &saved.entry.id, draft("Day 1", "<p>image removed</p>"))
        .await
        .expect("update persists despite cleanup failure");

    assert!(updated.outcome.persisted);
    assert!(!updated.outcome.assets_cleaned);
    let reloaded = h.lifecycle.get_entry(&user.id, &saved.entry.id).expect("get");
    assert_eq!(reloaded.content, "<p>image removed</p>");
}

#[tokio::test]
async fn update_response_carries_caller_plaintext() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    let saved = h
        .lifecycle
        .create_entry(&user.id, draft("Day 1", "<p>before</p>"))
        .await
        .expect("create");

    let updated = h
        .lifecycle
        .update_entry(&user.id, &saved.entry.id, draft("Day 1", "<p>after</p>"))
        .await
        .expect("update");
    assert_eq!(updated.entry.content, "<p>after</p>");
    assert_eq!(updated.entry.preview, "after");
}

#[tokio::test]
async fn cross_user_access_is_not_found_never_an_existence_leak() {
    let h = harness();
    let owner = seed_user(&h.db, "owner@example.com");
    let intruder = seed_user(&h.db, "intruder@example.com");
    let saved = h
        .lifecycle
        .create_entry(&owner.id, draft("Private", "<p>mine</p>"))
        .await
        .expect("create");

    assert!(matches!(
        h.lifecycle.get_entry(&intruder.id, &saved.entry.id),
        Err(EntryError::NotFound)
    ));
    assert!(matches!(
        h.lifecycle
            .update_entry(&intruder.id, &saved.entry.id, draft("Taken", "<p>x</p>"))
            .await,
        Err(EntryError::NotFound)
    ));
    assert!(matches!(
        h.lifecycle.delete_entry(&intruder.id, &saved.entry.id).await,
        Err(EntryError::NotFound)
    ));

    // The owner's entry is untouched by the failed attempts.
    let intact = h.lifecycle.get_entry(&owner.id, &saved.entry.id).expect("get");
    assert_eq!(intact.title, "Private");
}

#[tokio::test]
async fn failed_update_still_reconciles_pending_uploads() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    h.db
        .track_pending_upload(&user.id, "entries/images/orphan.png")
        .expect("track");

    let result = h
        .lifecycle
        .update_entry(&user.id, "no-such-entry", draft("Title", "<p>body</p>"))
        .await;
    assert!(matches!(result, Err(EntryError::NotFound)));

    // The editing session is over either way: orphan deleted, tracking gone.
    let deletes = h.assets.recorded_deletes();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0], ["entries/images/orphan.png".to_string()].into());
    assert!(h.db.pending_keys_for_owner(&user.id).expect("keys").is_empty());
}

#[tokio::test]
async fn validation_failure_skips_reconciliation() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    h.db
        .track_pending_upload(&user.id, "entries/images/waiting.png")
        .expect("track");

    let result = h
        .lifecycle
        .create_entry(&user.id, draft("", "<p>body</p>"))
        .await;
    assert!(matches!(result, Err(EntryError::Validation(_))));

    // Rejected before the save attempt began; the session is still open.
    assert_eq!(h.db.pending_keys_for_owner(&user.id).expect("keys").len(), 1);
    assert!(h.assets.recorded_deletes().is_empty());
}

#[tokio::test]
async fn unconfigured_insight_still_saves_without_embedding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = JournalDb::new(dir.path().join("journal.db")).expect("open db");
    let lifecycle = EntryLifecycle::new(
        db.clone(),
        ContentCodec::new("secret"),
        Arc::new(RecordingAssetStore::default()),
        AssetUrlScanner::new(BASE_URL).expect("scanner"),
        Arc::new(DisabledInsightClient),
        Arc::new(NoopMemoryStore),
    );
    let user = seed_user(&db, "a@example.com");

    let saved = lifecycle
        .create_entry(&user.id, draft("Day 1", "<p>quiet day</p>"))
        .await
        .expect("create");

    assert!(saved.outcome.persisted);
    assert!(!saved.outcome.embedding_updated);
    assert!(saved.entry.sentiment.is_none());
    assert!(db
        .embedding_for_entry(&saved.entry.id, &user.id)
        .expect("read")
        .is_none());
}

#[tokio::test]
async fn embedding_failure_on_update_keeps_the_stale_vector() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    let saved = h
        .lifecycle
        .create_entry(&user.id, draft("Day 1", "<p>first</p>"))
        .await
        .expect("create");
    assert_eq!(
        h.db.embedding_for_entry(&saved.entry.id, &user.id).expect("read"),
        Some(vec![1.0, 0.0])
    );

    h.insight.set_embedding(None);
    let updated = h
        .lifecycle
        .update_entry(&user.id, &saved.entry.id, draft("Day 1", "<p>second</p>"))
        .await
        .expect("update");

    assert!(!updated.outcome.embedding_updated);
    assert_eq!(
        h.db.embedding_for_entry(&saved.entry.id, &user.id).expect("read"),
        Some(vec![1.0, 0.0])
    );
}

#[tokio::test]
async fn delete_removes_document_and_referenced_assets() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    let saved = h
        .lifecycle
        .create_entry(&user.id, draft("Day 1", &image_content("entries/images/a.png")))
        .await
        .expect("create");

    h.lifecycle
        .delete_entry(&user.id, &saved.entry.id)
        .await
        .expect("delete");

    assert!(matches!(
        h.lifecycle.get_entry(&user.id, &saved.entry.id),
        Err(EntryError::NotFound)
    ));
    let deletes = h.assets.recorded_deletes();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0], ["entries/images/a.png".to_string()].into());
}

#[tokio::test]
async fn stale_sweep_removes_object_and_record_then_is_a_noop() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    h.db
        .track_pending_upload(&user.id, "entries/images/never-saved.png")
        .expect("track");

    // Threshold zero makes everything tracked up to now stale.
    let swept = h.lifecycle.sweep_stale_uploads(0).await.expect("sweep");
    assert_eq!(swept, 1);
    let deletes = h.assets.recorded_deletes();
    assert_eq!(deletes.len(), 1);
    assert_eq!(
        deletes[0],
        ["entries/images/never-saved.png".to_string()].into()
    );
    assert!(h.db.pending_keys_for_owner(&user.id).expect("keys").is_empty());

    let swept_again = h.lifecycle.sweep_stale_uploads(0).await.expect("sweep");
    assert_eq!(swept_again, 0);
    assert_eq!(h.assets.recorded_deletes().len(), 1);
}

#[tokio::test]
async fn fresh_uploads_survive_the_default_threshold() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    h.db
        .track_pending_upload(&user.id, "entries/images/just-uploaded.png")
        .expect("track");

    let swept = h
        .lifecycle
        .sweep_stale_uploads(STALE_UPLOAD_THRESHOLD_MS)
        .await
        .expect("sweep");
    assert_eq!(swept, 0);
    assert_eq!(h.db.pending_keys_for_owner(&user.id).expect("keys").len(), 1);
}

#[tokio::test]
async fn legacy_plaintext_content_reads_unchanged() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");
    let record = h
        .db
        .insert_entry(NewEntry {
            user_id: user.id.clone(),
            title: "Pre-encryption entry".to_string(),
            content: "written before encryption existed".to_string(),
            preview: "written before encryption existed".to_string(),
            tags: Vec::new(),
            entry_date_unix_ms: None,
            sentiment: None,
            ai_analysis: None,
        })
        .expect("insert");

    let view = h.lifecycle.get_entry(&user.id, &record.id).expect("get");
    assert_eq!(view.content, "written before encryption existed");
}

#[tokio::test]
async fn upload_asset_gates_type_and_size_then_tracks() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");

    let rejected_type = h
        .lifecycle
        .upload_asset(&user.id, "notes.pdf", "application/pdf", vec![0u8; 16])
        .await;
    assert!(matches!(rejected_type, Err(EntryError::InvalidUpload(_))));

    let rejected_size = h
        .lifecycle
        .upload_asset(
            &user.id,
            "huge.png",
            "image/png",
            vec![0u8; myarc_assets::MAX_UPLOAD_BYTES + 1],
        )
        .await;
    assert!(matches!(rejected_size, Err(EntryError::InvalidUpload(_))));

    let accepted = h
        .lifecycle
        .upload_asset(&user.id, "photo.png", "image/png", vec![0u8; 16])
        .await
        .expect("upload");
    assert!(accepted.url.starts_with(BASE_URL));
    assert!(accepted.key.starts_with("entries/images/"));
    assert_eq!(
        h.db.pending_keys_for_owner(&user.id).expect("keys"),
        vec![accepted.key.clone()]
    );
}

#[tokio::test]
async fn similar_entries_rank_by_embedding_similarity() {
    let h = harness();
    let user = seed_user(&h.db, "a@example.com");

    let reference = h
        .lifecycle
        .create_entry(&user.id, draft("Reference", "<p>running</p>"))
        .await
        .expect("create");
    let close = h
        .lifecycle
        .create_entry(&user.id, draft("Close", "<p>jogging</p>"))
        .await
        .expect("create");
    let far = h
        .lifecycle
        .create_entry(&user.id, draft("Far", "<p>cooking</p>"))
        .await
        .expect("create");

    h.db.update_embedding(&reference.entry.id, &user.id, &[1.0, 0.0]).expect("set");
    h.db.update_embedding(&close.entry.id, &user.id, &[0.9, 0.1]).expect("set");
    h.db.update_embedding(&far.entry.id, &user.id, &[0.0, 1.0]).expect("set");

    let ranked = h
        .lifecycle
        .similar_entries(&user.id, &reference.entry.id, 10)
        .expect("rank");
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].title, "Close");
    assert_eq!(ranked[1].title, "Far");

    // A reference without an embedding yields nothing rather than erroring.
    let record = h
        .db
        .insert_entry(NewEntry {
            user_id: user.id.clone(),
            title: "No vector".to_string(),
            content: "plain".to_string(),
            preview: "plain".to_string(),
            tags: Vec::new(),
            entry_date_unix_ms: None,
            sentiment: None,
            ai_analysis: None,
        })
        .expect("insert");
    assert!(h
        .lifecycle
        .similar_entries(&user.id, &record.id, 10)
        .expect("rank")
        .is_empty());
}

#[tokio::test]
async fn momentum_nudges_only_inactive_opted_in_users() {
    let h = harness();
    let inactive = seed_user(&h.db, "inactive@example.com");
    let active = seed_user(&h.db, "active@example.com");

    h.lifecycle
        .create_entry(&active.id, draft("Today", "<p>wrote today</p>"))
        .await
        .expect("create");

    let insight: Arc<dyn InsightClient> = h.insight.clone();
    let memory: Arc<dyn myarc_memory::MemoryStore> = Arc::new(NoopMemoryStore);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let reports = run_momentum_nudges(&h.db, &insight, &memory, &notifier)
        .await
        .expect("run");

    let inactive_report = reports
        .iter()
        .find(|report| report.email == inactive.email)
        .expect("report");
    assert_eq!(inactive_report.status, NudgeStatus::Nudged);
    assert!(inactive_report.message.is_some());

    let active_report = reports
        .iter()
        .find(|report| report.email == active.email)
        .expect("report");
    assert_eq!(active_report.status, NudgeStatus::Active);
    assert!(active_report.message.is_none());
}
