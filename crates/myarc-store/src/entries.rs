//! Entry persistence: owner-scoped CRUD with atomic per-document operations.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{JournalDb, StoreResult};

/// A stored journal entry. `content` is the encrypted at-rest token; the
/// embedding column is deliberately absent — it is excluded from default
/// retrieval and reachable only through the dedicated accessors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryRecord {
    pub id: String,
    pub user_id: String,
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

/// Listing projection: everything a list/search response needs, no content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub tags: Vec<String>,
    pub entry_date_unix_ms: u64,
    pub sentiment: Option<String>,
}

/// Fields for inserting a new entry. `content` arrives already encrypted.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub preview: String,
    pub tags: Vec<String>,
    pub entry_date_unix_ms: Option<u64>,
    pub sentiment: Option<String>,
    pub ai_analysis: Option<Value>,
}

/// Fields rewritten by an update. Sentiment and analysis are set at creation
/// and left untouched here.
#[derive(Debug, Clone)]
pub struct EntryChanges {
    pub title: String,
    pub content: String,
    pub preview: String,
    pub tags: Vec<String>,
}

const ENTRY_COLUMNS: &str = "id, user_id, title, content, preview, tags_json, \
     entry_date_unix_ms, sentiment, ai_analysis_json, created_unix_ms, updated_unix_ms";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(EntryRecord, String)> {
    Ok((
        EntryRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            preview: row.get(4)?,
            tags: Vec::new(),
            entry_date_unix_ms: row.get::<_, i64>(6)? as u64,
            sentiment: row.get(7)?,
            ai_analysis: None,
            created_unix_ms: row.get::<_, i64>(9)? as u64,
            updated_unix_ms: row.get::<_, i64>(10)? as u64,
        },
        row.get::<_, String>(5)?,
    ))
}

fn finish_entry(
    (mut entry, tags_json): (EntryRecord, String),
    ai_analysis_json: Option<String>,
) -> StoreResult<EntryRecord> {
    entry.tags = serde_json::from_str(&tags_json)?;
    entry.ai_analysis = ai_analysis_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    Ok(entry)
}

fn collect_list_items<P: rusqlite::Params>(
    connection: &rusqlite::Connection,
    sql: &str,
    params: P,
) -> StoreResult<Vec<EntryListItem>> {
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map(params, |row| {
        Ok((
            EntryListItem {
                id: row.get(0)?,
                title: row.get(1)?,
                preview: row.get(2)?,
                tags: Vec::new(),
                entry_date_unix_ms: row.get::<_, i64>(4)? as u64,
                sentiment: row.get(5)?,
            },
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (mut item, tags_json) = row?;
        item.tags = serde_json::from_str(&tags_json)?;
        items.push(item);
    }
    Ok(items)
}

impl JournalDb {
    /// Inserts a new entry and returns the stored record.
    pub fn insert_entry(&self, new: NewEntry) -> StoreResult<EntryRecord> {
        let connection = self.open_connection()?;
        let now = myarc_core::current_unix_timestamp_ms();
        let entry = EntryRecord {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            title: new.title,
            content: new.content,
            preview: new.preview,
            tags: new.tags,
            entry_date_unix_ms: new.entry_date_unix_ms.unwrap_or(now),
            sentiment: new.sentiment,
            ai_analysis: new.ai_analysis,
            created_unix_ms: now,
            updated_unix_ms: now,
        };

        let tags_json = serde_json::to_string(&entry.tags)?;
        let ai_analysis_json = entry
            .ai_analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        connection.execute(
            r#"
            INSERT INTO entries (
                id, user_id, title, content, preview, tags_json, entry_date_unix_ms,
                sentiment, ai_analysis_json, embedding_json, created_unix_ms, updated_unix_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, ?11)
            "#,
            params![
                entry.id,
                entry.user_id,
                entry.title,
                entry.content,
                entry.preview,
                tags_json,
                entry.entry_date_unix_ms as i64,
                entry.sentiment,
                ai_analysis_json,
                entry.created_unix_ms as i64,
                entry.updated_unix_ms as i64,
            ],
        )?;

        Ok(entry)
    }

    /// Loads an entry scoped to its owner. `None` covers both "absent" and
    /// "owned by someone else" — callers cannot distinguish, on purpose.
    pub fn find_entry(&self, id: &str, user_id: &str) -> StoreResult<Option<EntryRecord>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1 AND user_id = ?2"
                ),
                params![id, user_id],
                |row| {
                    let parts = entry_from_row(row)?;
                    let ai_analysis_json: Option<String> = row.get(8)?;
                    Ok((parts, ai_analysis_json))
                },
            )
            .optional()?;

        row.map(|(parts, ai_analysis_json)| finish_entry(parts, ai_analysis_json))
            .transpose()
    }

    /// Atomically rewrites an owner's entry. Returns the updated record, or
    /// `None` when no row matched (absent or not owned).
    pub fn update_entry(
        &self,
        id: &str,
        user_id: &str,
        changes: EntryChanges,
    ) -> StoreResult<Option<EntryRecord>> {
        let connection = self.open_connection()?;
        let tags_json = serde_json::to_string(&changes.tags)?;
        let now = myarc_core::current_unix_timestamp_ms();

        let updated = connection.execute(
            r#"
            UPDATE entries
            SET title = ?3, content = ?4, preview = ?5, tags_json = ?6, updated_unix_ms = ?7
            WHERE id = ?1 AND user_id = ?2
            "#,
            params![
                id,
                user_id,
                changes.title,
                changes.content,
                changes.preview,
                tags_json,
                now as i64,
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }

        drop(connection);
        self.find_entry(id, user_id)
    }

    /// Atomically removes an owner's entry, returning the removed record.
    pub fn delete_entry(&self, id: &str, user_id: &str) -> StoreResult<Option<EntryRecord>> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;

        let row = transaction
            .query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1 AND user_id = ?2"
                ),
                params![id, user_id],
                |row| {
                    let parts = entry_from_row(row)?;
                    let ai_analysis_json: Option<String> = row.get(8)?;
                    Ok((parts, ai_analysis_json))
                },
            )
            .optional()?;

        let Some((parts, ai_analysis_json)) = row else {
            return Ok(None);
        };

        transaction.execute(
            "DELETE FROM entries WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        transaction.commit()?;

        Ok(Some(finish_entry(parts, ai_analysis_json)?))
    }

    /// Lists an owner's entries newest-first, optionally filtered by a
    /// keyword over title, preview, and tags. Content is ciphertext and is
    /// never searched.
    pub fn list_entries(
        &self,
        user_id: &str,
        keyword: Option<&str>,
    ) -> StoreResult<Vec<EntryListItem>> {
        let connection = self.open_connection()?;

        match keyword.map(str::trim).filter(|value| !value.is_empty()) {
            Some(keyword) => {
                let needle = format!("%{}%", keyword.replace('%', "\\%").replace('_', "\\_"));
                collect_list_items(
                    &connection,
                    r#"
                    SELECT id, title, preview, tags_json, entry_date_unix_ms, sentiment
                    FROM entries
                    WHERE user_id = ?1
                      AND (title LIKE ?2 ESCAPE '\'
                           OR preview LIKE ?2 ESCAPE '\'
                           OR tags_json LIKE ?2 ESCAPE '\')
                    ORDER BY entry_date_unix_ms DESC
                    "#,
                    params![user_id, needle],
                )
            }
            None => collect_list_items(
                &connection,
                r#"
                SELECT id, title, preview, tags_json, entry_date_unix_ms, sentiment
                FROM entries
                WHERE user_id = ?1
                ORDER BY entry_date_unix_ms DESC
                "#,
                params![user_id],
            ),
        }
    }

    /// Stores a freshly computed embedding for an owner's entry.
    pub fn update_embedding(
        &self,
        id: &str,
        user_id: &str,
        embedding: &[f32],
    ) -> StoreResult<bool> {
        let connection = self.open_connection()?;
        let embedding_json = serde_json::to_string(embedding)?;
        let updated = connection.execute(
            "UPDATE entries SET embedding_json = ?3 WHERE id = ?1 AND user_id = ?2",
            params![id, user_id, embedding_json],
        )?;
        Ok(updated > 0)
    }

    /// Reads one entry's stored embedding, if any.
    pub fn embedding_for_entry(
        &self,
        id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Vec<f32>>> {
        let connection = self.open_connection()?;
        let embedding_json = connection
            .query_row(
                "SELECT embedding_json FROM entries WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        embedding_json
            .as_deref()
            .map(|raw| serde_json::from_str(raw).map_err(Into::into))
            .transpose()
    }

    /// All of an owner's entries that carry embeddings, for similarity
    /// ranking. Rows without embeddings are skipped.
    pub fn embeddings_for_owner(
        &self,
        user_id: &str,
    ) -> StoreResult<Vec<(String, Vec<f32>)>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(
            "SELECT id, embedding_json FROM entries \
             WHERE user_id = ?1 AND embedding_json IS NOT NULL",
        )?;
        let rows = statement.query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut embeddings = Vec::new();
        for row in rows {
            let (id, embedding_json) = row?;
            embeddings.push((id, serde_json::from_str(&embedding_json)?));
        }
        Ok(embeddings)
    }

    /// Most recent entry date for an owner, for inactivity checks.
    pub fn latest_entry_date(&self, user_id: &str) -> StoreResult<Option<u64>> {
        let connection = self.open_connection()?;
        let latest = connection
            .query_row(
                "SELECT MAX(entry_date_unix_ms) FROM entries WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        Ok(latest.map(|value| value as u64))
    }
}
