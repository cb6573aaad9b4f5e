//! User records: ownership anchor for entries and uploads, plus the settings
//! consumed by peripheral notification features.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{JournalDb, StoreResult};

/// Per-user feature toggles. Stored as JSON so new flags do not require a
/// schema migration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub email_notifications: bool,
    pub daily_reminders: bool,
    pub growth_insights: bool,
    pub momentum_reminders: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            daily_reminders: true,
            growth_insights: true,
            momentum_reminders: true,
        }
    }
}

/// A stored user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub is_onboarded: bool,
    pub current_focus: Option<String>,
    pub settings: UserSettings,
    pub created_unix_ms: u64,
}

/// Partial settings update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsChanges {
    pub email_notifications: Option<bool>,
    pub daily_reminders: Option<bool>,
    pub growth_insights: Option<bool>,
    pub momentum_reminders: Option<bool>,
}

impl SettingsChanges {
    fn apply(&self, settings: &mut UserSettings) {
        if let Some(value) = self.email_notifications {
            settings.email_notifications = value;
        }
        if let Some(value) = self.daily_reminders {
            settings.daily_reminders = value;
        }
        if let Some(value) = self.growth_insights {
            settings.growth_insights = value;
        }
        if let Some(value) = self.momentum_reminders {
            settings.momentum_reminders = value;
        }
    }
}

/// Partial profile update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub current_focus: Option<String>,
    pub is_onboarded: Option<bool>,
    pub settings: Option<SettingsChanges>,
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(UserRecord, String)> {
    Ok((
        UserRecord {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            is_onboarded: row.get::<_, i64>(3)? != 0,
            current_focus: row.get(4)?,
            settings: UserSettings::default(),
            created_unix_ms: row.get::<_, i64>(6)? as u64,
        },
        row.get::<_, String>(5)?,
    ))
}

fn finish_user((mut user, settings_json): (UserRecord, String)) -> StoreResult<UserRecord> {
    user.settings = serde_json::from_str(&settings_json)?;
    Ok(user)
}

const USER_COLUMNS: &str =
    "id, email, name, is_onboarded, current_focus, settings_json, created_unix_ms";

impl JournalDb {
    /// Creates a user with default settings.
    pub fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        api_token: Option<&str>,
    ) -> StoreResult<UserRecord> {
        let connection = self.open_connection()?;
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.map(str::to_string),
            is_onboarded: false,
            current_focus: None,
            settings: UserSettings::default(),
            created_unix_ms: myarc_core::current_unix_timestamp_ms(),
        };
        let settings_json = serde_json::to_string(&user.settings)?;

        connection.execute(
            r#"
            INSERT INTO users (id, email, name, api_token, is_onboarded, current_focus,
                               settings_json, created_unix_ms)
            VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5, ?6)
            "#,
            params![
                user.id,
                user.email,
                user.name,
                api_token,
                settings_json,
                user.created_unix_ms as i64,
            ],
        )?;

        Ok(user)
    }

    /// Resolves the bearer token presented by a request to its user.
    pub fn find_user_by_token(&self, api_token: &str) -> StoreResult<Option<UserRecord>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE api_token = ?1"),
                params![api_token],
                user_from_row,
            )
            .optional()?;
        row.map(finish_user).transpose()
    }

    pub fn find_user(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        row.map(finish_user).transpose()
    }

    /// Applies a partial profile update and returns the updated user.
    pub fn update_user_profile(
        &self,
        id: &str,
        changes: &ProfileChanges,
    ) -> StoreResult<Option<UserRecord>> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;

        let row = transaction
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        let Some(parts) = row else {
            return Ok(None);
        };
        let mut user = finish_user(parts)?;

        if let Some(name) = changes.name.as_deref() {
            user.name = Some(name.to_string());
        }
        if let Some(current_focus) = changes.current_focus.as_deref() {
            user.current_focus = Some(current_focus.to_string());
        }
        if let Some(is_onboarded) = changes.is_onboarded {
            user.is_onboarded = is_onboarded;
        }
        if let Some(settings) = changes.settings.as_ref() {
            settings.apply(&mut user.settings);
        }

        let settings_json = serde_json::to_string(&user.settings)?;
        transaction.execute(
            r#"
            UPDATE users
            SET name = ?2, current_focus = ?3, is_onboarded = ?4, settings_json = ?5
            WHERE id = ?1
            "#,
            params![
                id,
                user.name,
                user.current_focus,
                user.is_onboarded as i64,
                settings_json,
            ],
        )?;
        transaction.commit()?;

        Ok(Some(user))
    }

    /// Users who opted into momentum reminder nudges.
    pub fn users_with_momentum_reminders(&self) -> StoreResult<Vec<UserRecord>> {
        let connection = self.open_connection()?;
        let mut statement =
            connection.prepare(&format!("SELECT {USER_COLUMNS} FROM users"))?;
        let rows = statement.query_map([], user_from_row)?;

        let mut users = Vec::new();
        for row in rows {
            let user = finish_user(row?)?;
            if user.settings.momentum_reminders {
                users.push(user);
            }
        }
        Ok(users)
    }
}
