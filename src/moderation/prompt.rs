// Moderation prompt — what a moderator sees for one suspicious message.

use serde::Serialize;

use super::actions::{ActionKind, ModerationAction};
use crate::db::models::NewSuspect;
use crate::output::truncate_chars;

/// Longest excerpt of the offending message quoted in a prompt.
pub const PROMPT_TEXT_MAX_CHARS: usize = 700;

/// Shown instead of the message body for media without a caption.
pub const MEDIA_PLACEHOLDER: &str = "[media]";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationPrompt {
    /// Chat the prompt is delivered to
    pub moderation_chat_id: i64,
    /// Chat the message was posted in
    pub source_chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub text: Option<String>,
    pub confidence: Option<f64>,
    pub reason: Option<String>,
    /// Skip, ban, trust, in that order
    pub actions: [ModerationAction; 3],
}

impl ModerationPrompt {
    pub fn new(moderation_chat_id: i64, suspect: &NewSuspect, reason: Option<String>) -> Self {
        let actions = ActionKind::ALL
            .map(|kind| ModerationAction::new(kind, suspect.message_id, suspect.user_id));
        Self {
            moderation_chat_id,
            source_chat_id: suspect.chat_id,
            message_id: suspect.message_id,
            user_id: suspect.user_id,
            username: suspect.username.clone(),
            full_name: suspect.full_name.clone(),
            text: suspect.text.clone(),
            confidence: suspect.confidence,
            reason,
            actions,
        }
    }

    /// Plain-text body of the prompt.
    pub fn render(&self) -> String {
        let name = self.full_name.as_deref().unwrap_or("unknown");
        let handle = self
            .username
            .as_deref()
            .map(|u| format!("@{u}"))
            .unwrap_or_else(|| "none".to_string());
        let body = match self.text.as_deref() {
            Some(t) if !t.trim().is_empty() => truncate_chars(t, PROMPT_TEXT_MAX_CHARS),
            _ => MEDIA_PLACEHOLDER.to_string(),
        };

        let mut out = format!(
            "👾 SUSPICIOUS USER\n\n\
             👤 Name: {name}\n\
             🆔 ID: {}\n\
             📝 Username: {handle}\n\
             💬 Message:\n{body}\n",
            self.user_id
        );
        match (self.confidence, &self.reason) {
            (Some(c), _) => out.push_str(&format!("\n🎯 Classifier confidence: {:.0}%\n", c * 100.0)),
            (None, Some(reason)) => out.push_str(&format!("\n🎯 Rule: {reason}\n")),
            (None, None) => {}
        }
        out.push_str("\n👀 What now?");
        out
    }

    /// (button caption, callback payload) pairs.
    pub fn buttons(&self) -> Vec<(&'static str, String)> {
        self.actions
            .iter()
            .map(|a| (a.kind.button_label(), a.encode()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suspect(text: Option<&str>) -> NewSuspect {
        NewSuspect {
            chat_id: -100,
            message_id: 77,
            user_id: 5,
            username: Some("spammer".to_string()),
            full_name: Some("Spam Bot".to_string()),
            text: text.map(String::from),
            confidence: None,
        }
    }

    #[test]
    fn test_render_includes_identity_and_reason() {
        let p = ModerationPrompt::new(-200, &suspect(Some("забери подарок")), Some("pattern:urgency".into()));
        let body = p.render();
        assert!(body.contains("Spam Bot"));
        assert!(body.contains("@spammer"));
        assert!(body.contains("забери подарок"));
        assert!(body.contains("Rule: pattern:urgency"));
    }

    #[test]
    fn test_media_and_long_text() {
        let p = ModerationPrompt::new(-200, &suspect(None), None);
        assert!(p.render().contains(MEDIA_PLACEHOLDER));

        let long = "а".repeat(PROMPT_TEXT_MAX_CHARS + 50);
        let p = ModerationPrompt::new(-200, &suspect(Some(&long)), None);
        assert!(p.render().contains("..."));
    }

    #[test]
    fn test_buttons_encode_all_actions() {
        let p = ModerationPrompt::new(-200, &suspect(Some("x")), None);
        let payloads: Vec<String> = p.buttons().into_iter().map(|(_, d)| d).collect();
        assert_eq!(payloads, vec!["skip:77:5", "ban:77:5", "trust:77:5"]);
    }
}
