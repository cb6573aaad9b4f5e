//! Momentum nudges: inactivity detection plus a personalized reminder
//! generated from the user's goal and habit memories.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use myarc_ai::InsightClient;
use myarc_memory::MemoryStore;
use myarc_store::JournalDb;

use crate::lifecycle::EntryError;

/// A user with no entry in this window is considered inactive.
pub const INACTIVITY_THRESHOLD_MS: u64 = 24 * 60 * 60 * 1_000;

const NUDGE_SUBJECT: &str = "Your arc is waiting...";
const FALLBACK_NUDGE: &str =
    "It's been a little while since you last wrote. Take two minutes to capture where today went.";

#[derive(Debug, Error)]
/// Errors from nudge delivery backends.
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
/// Capability contract for delivering nudges to users.
pub trait Notifier: Send + Sync {
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Default delivery backend: records the nudge in the log stream. Used when
/// no outbound channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(%email, %subject, %body, "momentum nudge");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Outcome of one user's nudge evaluation.
pub enum NudgeStatus {
    Nudged,
    Active,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Per-user report from a nudge run.
pub struct NudgeReport {
    pub email: String,
    pub status: NudgeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn build_nudge_prompt(context: &str) -> String {
    format!(
        r#"The user hasn't journaled in over 24 hours.
Write a short, encouraging 2-sentence email notification to nudge them to reflect.

USER CONTEXT (Goals/Habits):
{context}

Tone: Warm, curious, un-intrusive.
Format: Just the message body.
"#
    )
}

/// Evaluates every opted-in user and nudges those with no entry inside the
/// inactivity window. Memory and generation failures degrade to a generic
/// nudge rather than skipping the user.
pub async fn run_momentum_nudges(
    db: &JournalDb,
    insight: &Arc<dyn InsightClient>,
    memory: &Arc<dyn MemoryStore>,
    notifier: &Arc<dyn Notifier>,
) -> Result<Vec<NudgeReport>, EntryError> {
    let users = db.users_with_momentum_reminders()?;
    let now = myarc_core::current_unix_timestamp_ms();
    let mut reports = Vec::with_capacity(users.len());

    for user in users {
        let last_entry = db.latest_entry_date(&user.id)?;
        let inactive = match last_entry {
            Some(last) => now.saturating_sub(last) > INACTIVITY_THRESHOLD_MS,
            None => true,
        };
        if !inactive {
            reports.push(NudgeReport {
                email: user.email,
                status: NudgeStatus::Active,
                message: None,
            });
            continue;
        }

        let memories = match memory.search_by_category(&user.id, &["goals", "habits"]).await {
            Ok(memories) => memories,
            Err(error) => {
                warn!(%error, user_id = %user.id, "memory fetch failed for nudge context");
                Vec::new()
            }
        };
        let context = if memories.is_empty() {
            "User is focusing on general self-improvement.".to_string()
        } else {
            memories.join("\n")
        };

        let message = insight
            .generate_text(&build_nudge_prompt(&context))
            .await
            .unwrap_or_else(|| FALLBACK_NUDGE.to_string());

        if let Err(error) = notifier.notify(&user.email, NUDGE_SUBJECT, &message).await {
            warn!(%error, email = %user.email, "nudge delivery failed");
        }

        reports.push(NudgeReport {
            email: user.email,
            status: NudgeStatus::Nudged,
            message: Some(message),
        });
    }

    Ok(reports)
}
