// Incoming chat messages as the core sees them.
//
// The transport layer converts its native update type into these structs.
// Nothing in the core mutates a message.

use serde::{Deserialize, Serialize};

/// Identity of a message author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub id: i64,
    /// Public handle without the leading '@'
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AuthorInfo {
    /// Display name built from first and last name, falling back to the handle.
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();

        if !parts.is_empty() {
            parts.join(" ")
        } else if let Some(username) = &self.username {
            username.clone()
        } else {
            format!("user {}", self.id)
        }
    }
}

/// A message posted in the monitored channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub chat_id: i64,
    /// Unique within `chat_id`
    pub message_id: i64,
    pub author: AuthorInfo,
    pub text: Option<String>,
    /// Caption attached to a photo/video/document
    pub caption: Option<String>,
}

impl IncomingMessage {
    /// The text the detector should look at: body text, else the media caption.
    /// Blank body text doesn't hide a caption.
    pub fn content(&self) -> &str {
        non_blank(self.text.as_deref())
            .or_else(|| non_blank(self.caption.as_deref()))
            .unwrap_or("")
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|t| !t.trim().is_empty())
}
