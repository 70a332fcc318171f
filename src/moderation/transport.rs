// Chat transport — the side of the moderation flow that talks to the chat.
//
// The live bot connection is outside this crate. Callers plug in their own
// implementation; `DryRunTransport` logs every call and succeeds, which is
// what the CLI uses. With `echo` set it also prints each prompt.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::prompt::ModerationPrompt;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a prompt (with its three action buttons) to the moderation chat.
    async fn send_moderation_prompt(&self, prompt: &ModerationPrompt) -> Result<()>;

    /// Ban `user_id` from `chat_id`.
    async fn ban_user(&self, chat_id: i64, user_id: i64) -> Result<()>;

    /// Delete one message. Callers treat failure as non-fatal.
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;
}

/// Transport that performs no chat calls.
#[derive(Debug, Default, Clone)]
pub struct DryRunTransport {
    pub echo: bool,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prints every prompt to the terminal as well as logging it.
    pub fn echoing() -> Self {
        Self { echo: true }
    }
}

#[async_trait]
impl Transport for DryRunTransport {
    async fn send_moderation_prompt(&self, prompt: &ModerationPrompt) -> Result<()> {
        info!(
            chat_id = prompt.moderation_chat_id,
            message_id = prompt.message_id,
            user_id = prompt.user_id,
            "[dry run] would send moderation prompt"
        );
        if self.echo {
            crate::output::terminal::display_prompt(prompt);
        }
        Ok(())
    }

    async fn ban_user(&self, chat_id: i64, user_id: i64) -> Result<()> {
        info!(chat_id, user_id, "[dry run] would ban user");
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        info!(chat_id, message_id, "[dry run] would delete message");
        Ok(())
    }
}
