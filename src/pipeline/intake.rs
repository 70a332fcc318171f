// Message intake — screen channel messages and queue the suspicious ones.
//
// Flow per message: trusted authors are skipped outright, everything else
// goes through the detector. A suspicious message is recorded first and only
// then sent to moderators, because a prompt whose record is missing can't be
// acted on. Failures here never propagate to the caller's event loop; they
// are logged and reflected in the returned `ScreenOutcome`.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::db::models::NewSuspect;
use crate::db::Database;
use crate::message::IncomingMessage;
use crate::moderation::{ModerationPrompt, Transport};
use crate::scoring::{Detector, Verdict};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScreenOutcome {
    /// Author is on the trusted list.
    Trusted,
    Clean(Verdict),
    /// Recorded and sent to moderators.
    Queued(Verdict),
    /// A pending record already exists for this message.
    AlreadyQueued(Verdict),
    /// Suspicious, but the record could not be stored.
    NotRecorded(Verdict),
    /// Recorded, but the prompt did not reach moderators.
    PromptFailed(Verdict),
}

impl ScreenOutcome {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            ScreenOutcome::Trusted => None,
            ScreenOutcome::Clean(v)
            | ScreenOutcome::Queued(v)
            | ScreenOutcome::AlreadyQueued(v)
            | ScreenOutcome::NotRecorded(v)
            | ScreenOutcome::PromptFailed(v) => Some(v),
        }
    }
}

pub struct Intake {
    db: Arc<dyn Database>,
    detector: Arc<Detector>,
    transport: Arc<dyn Transport>,
    moderation_chat_id: i64,
}

impl Intake {
    pub fn new(
        db: Arc<dyn Database>,
        detector: Arc<Detector>,
        transport: Arc<dyn Transport>,
        moderation_chat_id: i64,
    ) -> Self {
        Self {
            db,
            detector,
            transport,
            moderation_chat_id,
        }
    }

    pub async fn screen_message(&self, msg: &IncomingMessage) -> ScreenOutcome {
        let author = &msg.author;

        match self.db.is_trusted(author.id).await {
            Ok(true) => {
                debug!(user_id = author.id, "Trusted author; skipping detection");
                return ScreenOutcome::Trusted;
            }
            Ok(false) => {}
            // Better to screen a trusted user than to let spam through
            Err(e) => warn!(user_id = author.id, error = %e, "Trust lookup failed; screening anyway"),
        }

        let text = msg.content();
        let verdict = self.detector.decide(text, author).await;
        if !verdict.suspicious {
            return ScreenOutcome::Clean(verdict);
        }

        let suspect = NewSuspect {
            chat_id: msg.chat_id,
            message_id: msg.message_id,
            user_id: author.id,
            username: author.username.clone(),
            full_name: Some(author.full_name()),
            text: (!text.trim().is_empty()).then(|| text.to_string()),
            confidence: verdict.confidence,
        };

        match self.db.add_suspect_record(&suspect).await {
            Ok(true) => {}
            Ok(false) => {
                info!(message_id = msg.message_id, "Message already pending moderation");
                return ScreenOutcome::AlreadyQueued(verdict);
            }
            Err(e) => {
                error!(
                    message_id = msg.message_id,
                    user_id = author.id,
                    error = %e,
                    "suspect record not persisted; message cannot be moderated"
                );
                return ScreenOutcome::NotRecorded(verdict);
            }
        }

        let prompt = ModerationPrompt::new(self.moderation_chat_id, &suspect, verdict.reason.clone());
        if let Err(e) = self.transport.send_moderation_prompt(&prompt).await {
            error!(message_id = msg.message_id, error = %e, "Failed to deliver moderation prompt");
            return ScreenOutcome::PromptFailed(verdict);
        }

        info!(
            message_id = msg.message_id,
            user_id = author.id,
            reason = ?verdict.reason,
            confidence = ?verdict.confidence,
            "Suspicious message queued for moderation"
        );
        ScreenOutcome::Queued(verdict)
    }

    /// Screen many messages concurrently. Results come back in input order.
    pub async fn screen_batch(
        &self,
        messages: &[IncomingMessage],
        concurrency: usize,
    ) -> Vec<ScreenOutcome> {
        let mut results: Vec<(usize, ScreenOutcome)> =
            stream::iter(messages.iter().enumerate().map(|(i, msg)| async move {
                (i, self.screen_message(msg).await)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, outcome)| outcome).collect()
    }
}
