// Moderation state machine — pending -> {skipped, banned, trusted}.
//
// The only entry point is a moderator action keyed by message identity. A
// transition is claimed with a compare-and-set in the database before any
// side effect runs, so duplicate clicks and concurrent moderators produce
// exactly one ban call and one training example. Everyone else gets an
// "already handled" no-op.
//
// The status row is the source of truth. Failures of the chat calls (ban,
// delete) or of writing the training example are reported in the outcome
// and logged; they never roll the status back.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use super::actions::{ActionKind, ModerationAction};
use super::transport::Transport;
use crate::db::models::{SuspectRecord, SuspectStatus};
use crate::db::Database;

/// Training label for a skipped (benign) message.
pub const LABEL_BENIGN: i64 = 0;
/// Training label for a banned (spam) message.
pub const LABEL_SPAM: i64 = 1;

/// What a moderator action did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "status", rename_all = "snake_case")]
pub enum Transition {
    /// This call moved the record out of pending.
    Applied(SuspectStatus),
    /// The record was already terminal; nothing changed.
    AlreadyHandled(SuspectStatus),
    /// No record exists for the message.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationOutcome {
    pub action: ModerationAction,
    pub transition: Transition,
    pub training_example_id: Option<i64>,
    pub ban_error: Option<String>,
    pub delete_error: Option<String>,
    pub bookkeeping_error: Option<String>,
}

impl ModerationOutcome {
    fn new(action: ModerationAction, transition: Transition) -> Self {
        Self {
            action,
            transition,
            training_example_id: None,
            ban_error: None,
            delete_error: None,
            bookkeeping_error: None,
        }
    }

    pub fn applied(&self) -> bool {
        matches!(self.transition, Transition::Applied(_))
    }

    /// Text appended to the moderation prompt after the action.
    pub fn acknowledgment(&self) -> String {
        let mut ack = match self.transition {
            Transition::Applied(SuspectStatus::Skipped) => "✅ User skipped".to_string(),
            Transition::Applied(SuspectStatus::Banned) => {
                "🔨 User was eaten by the monster! 🐉".to_string()
            }
            Transition::Applied(SuspectStatus::Trusted) => "👑 User is now trusted".to_string(),
            Transition::Applied(SuspectStatus::Pending) => "Record is still pending".to_string(),
            Transition::AlreadyHandled(status) => {
                format!("ℹ️ Already handled (status: {status}); nothing changed")
            }
            Transition::NotFound => "⚠️ No suspect record for this message".to_string(),
        };
        if let Some(e) = &self.ban_error {
            ack.push_str(&format!("\n❌ Ban failed: {e}"));
        }
        if let Some(e) = &self.delete_error {
            ack.push_str(&format!("\n⚠️ Message not deleted: {e}"));
        }
        if let Some(e) = &self.bookkeeping_error {
            ack.push_str(&format!("\n⚠️ {e}"));
        }
        ack
    }
}

pub struct ModerationMachine {
    db: Arc<dyn Database>,
    transport: Arc<dyn Transport>,
    /// Monitored channel; ban and delete target
    channel_id: i64,
}

impl ModerationMachine {
    pub fn new(db: Arc<dyn Database>, transport: Arc<dyn Transport>, channel_id: i64) -> Self {
        Self {
            db,
            transport,
            channel_id,
        }
    }

    /// Apply a moderator action.
    ///
    /// `Err` only when the database could not read or update the record.
    /// Everything downstream of a successful transition is reported in the
    /// outcome instead.
    pub async fn handle(
        &self,
        action: ModerationAction,
        moderator_id: i64,
    ) -> Result<ModerationOutcome> {
        let Some(record) = self
            .db
            .get_suspect_record(action.message_id)
            .await
            .context("Failed to load suspect record")?
        else {
            warn!(message_id = action.message_id, "Moderation action for unknown message");
            return Ok(ModerationOutcome::new(action, Transition::NotFound));
        };

        if record.user_id != action.user_id {
            warn!(
                message_id = action.message_id,
                record_user = record.user_id,
                action_user = action.user_id,
                "Action user differs from recorded author; using the recorded author"
            );
        }

        let target = action.kind.target_status();
        let claimed = record.status == SuspectStatus::Pending
            && self
                .db
                .transition_suspect(action.message_id, target)
                .await
                .context("Failed to update suspect status")?;

        if !claimed {
            let current = self
                .db
                .get_suspect_record(action.message_id)
                .await
                .context("Failed to reload suspect record")?
                .map(|r| r.status)
                .unwrap_or(record.status);
            info!(
                message_id = action.message_id,
                status = %current,
                "Duplicate moderation action ignored"
            );
            return Ok(ModerationOutcome::new(action, Transition::AlreadyHandled(current)));
        }

        let mut outcome = ModerationOutcome::new(action, Transition::Applied(target));
        match action.kind {
            ActionKind::Skip => {
                self.record_example(&record, LABEL_BENIGN, moderator_id, &mut outcome)
                    .await;
            }
            ActionKind::Ban => self.ban(&record, moderator_id, &mut outcome).await,
            ActionKind::Trust => self.trust(&record, &mut outcome).await,
        }

        info!(
            message_id = action.message_id,
            user_id = record.user_id,
            moderator_id,
            status = %target,
            "Moderation action applied"
        );
        Ok(outcome)
    }

    /// Parse callback data and apply it.
    pub async fn handle_callback(&self, data: &str, moderator_id: i64) -> Result<ModerationOutcome> {
        let action = ModerationAction::parse(data)?;
        self.handle(action, moderator_id).await
    }

    async fn ban(&self, record: &SuspectRecord, moderator_id: i64, outcome: &mut ModerationOutcome) {
        if let Err(e) = self.transport.ban_user(self.channel_id, record.user_id).await {
            error!(user_id = record.user_id, error = %e, "Ban call failed");
            outcome.ban_error = Some(format!("{e:#}"));
        }

        // The label stands whether or not the ban went through
        self.record_example(record, LABEL_SPAM, moderator_id, outcome)
            .await;

        if let Err(e) = self
            .transport
            .delete_message(self.channel_id, record.message_id)
            .await
        {
            warn!(message_id = record.message_id, error = %e, "Could not delete banned message");
            outcome.delete_error = Some(format!("{e:#}"));
        }
    }

    async fn trust(&self, record: &SuspectRecord, outcome: &mut ModerationOutcome) {
        if let Err(e) = self
            .db
            .add_trusted_user(
                record.user_id,
                record.username.as_deref(),
                record.full_name.as_deref(),
            )
            .await
        {
            error!(user_id = record.user_id, error = %e, "Failed to add trusted user");
            outcome.bookkeeping_error = Some(format!("Trusted list not updated: {e:#}"));
        }
    }

    async fn record_example(
        &self,
        record: &SuspectRecord,
        label: i64,
        moderator_id: i64,
        outcome: &mut ModerationOutcome,
    ) {
        let Some(text) = record
            .suspect_message
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        else {
            info!(message_id = record.message_id, "No captured text; no training example");
            return;
        };

        match self.db.add_training_example(text, label, moderator_id).await {
            Ok(id) => outcome.training_example_id = Some(id),
            Err(e) => {
                error!(message_id = record.message_id, error = %e, "Failed to store training example");
                outcome.bookkeeping_error = Some(format!("Training example not stored: {e:#}"));
            }
        }
    }
}
