// Moderator actions and their callback encoding.
//
// A moderation prompt carries three buttons. Each button's payload is
// `<action>:<message_id>:<user_id>`, which is all the state machine needs to
// find the suspect record again when the button is pressed.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::db::models::SuspectStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Skip,
    Ban,
    Trust,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Skip, ActionKind::Ban, ActionKind::Trust];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Skip => "skip",
            ActionKind::Ban => "ban",
            ActionKind::Trust => "trust",
        }
    }

    /// Terminal status this action moves a pending record into.
    pub fn target_status(&self) -> SuspectStatus {
        match self {
            ActionKind::Skip => SuspectStatus::Skipped,
            ActionKind::Ban => SuspectStatus::Banned,
            ActionKind::Trust => SuspectStatus::Trusted,
        }
    }

    /// Button caption shown to moderators.
    pub fn button_label(&self) -> &'static str {
        match self {
            ActionKind::Skip => "✅ Skip",
            ActionKind::Ban => "🔨 Ban",
            ActionKind::Trust => "👑 Trust",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(ActionKind::Skip),
            "ban" => Ok(ActionKind::Ban),
            "trust" => Ok(ActionKind::Trust),
            other => bail!("Unknown moderation action '{other}' (expected skip, ban or trust)"),
        }
    }
}

/// One moderator decision about one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationAction {
    pub kind: ActionKind,
    pub message_id: i64,
    /// Author as recorded in the prompt
    pub user_id: i64,
}

impl ModerationAction {
    pub fn new(kind: ActionKind, message_id: i64, user_id: i64) -> Self {
        Self {
            kind,
            message_id,
            user_id,
        }
    }

    /// Callback payload: `<action>:<message_id>:<user_id>`.
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.kind, self.message_id, self.user_id)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let mut parts = data.trim().split(':');
        let (Some(kind), Some(message_id), Some(user_id), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            bail!("Malformed callback data '{data}' (expected action:message_id:user_id)");
        };

        Ok(Self {
            kind: kind.parse()?,
            message_id: message_id
                .parse()
                .with_context(|| format!("Invalid message id in callback data '{data}'"))?,
            user_id: user_id
                .parse()
                .with_context(|| format!("Invalid user id in callback data '{data}'"))?,
        })
    }
}
