//! Pending-upload tracking: provisional records for assets uploaded before
//! their owning entry save is confirmed.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::{JournalDb, StoreResult};

/// One tracked provisional upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingUploadRecord {
    pub id: i64,
    pub user_id: String,
    pub object_key: String,
    pub created_unix_ms: u64,
}

impl JournalDb {
    /// Records an upload the moment it lands in object storage.
    pub fn track_pending_upload(&self, user_id: &str, object_key: &str) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "INSERT INTO pending_uploads (user_id, object_key, created_unix_ms) \
             VALUES (?1, ?2, ?3)",
            params![
                user_id,
                object_key,
                myarc_core::current_unix_timestamp_ms() as i64
            ],
        )?;
        Ok(())
    }

    /// Keys of every tracked upload for one owner.
    pub fn pending_keys_for_owner(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let connection = self.open_connection()?;
        let mut statement = connection
            .prepare("SELECT object_key FROM pending_uploads WHERE user_id = ?1")?;
        let keys = statement
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Drops every tracking record for one owner; returns how many went.
    pub fn clear_pending_for_owner(&self, user_id: &str) -> StoreResult<usize> {
        let connection = self.open_connection()?;
        let removed = connection.execute(
            "DELETE FROM pending_uploads WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(removed)
    }

    /// Tracked uploads, across all owners, created strictly before `cutoff`.
    pub fn stale_pending_uploads(
        &self,
        cutoff_unix_ms: u64,
    ) -> StoreResult<Vec<PendingUploadRecord>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(
            "SELECT id, user_id, object_key, created_unix_ms \
             FROM pending_uploads WHERE created_unix_ms < ?1",
        )?;
        let records = statement
            .query_map(params![cutoff_unix_ms as i64], |row| {
                Ok(PendingUploadRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    object_key: row.get(2)?,
                    created_unix_ms: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Removes tracking records by id. Ids already removed by a concurrent
    /// save simply do not count; the sweep tolerates that.
    pub fn remove_pending_by_ids(&self, ids: &[i64]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let connection = self.open_connection()?;
        let mut removed = 0;
        for id in ids {
            removed += connection.execute(
                "DELETE FROM pending_uploads WHERE id = ?1",
                params![id],
            )?;
        }
        Ok(removed)
    }
}
