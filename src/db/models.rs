// Data models — Rust structs that map to database rows.
//
// These are the types that flow through the moderation pipeline. They're
// separate from the queries so the rule engine, state machine, and training
// loop can use them without depending on rusqlite directly.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a suspect record.
///
/// `Pending` is the only non-terminal state. Every other status is final:
/// the state machine refuses to transition out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspectStatus {
    Pending,
    Skipped,
    Banned,
    Trusted,
}

impl SuspectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspectStatus::Pending => "pending",
            SuspectStatus::Skipped => "skipped",
            SuspectStatus::Banned => "banned",
            SuspectStatus::Trusted => "trusted",
        }
    }

    /// Parse the stored column value. Unknown strings yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SuspectStatus::Pending),
            "skipped" => Some(SuspectStatus::Skipped),
            "banned" => Some(SuspectStatus::Banned),
            "trusted" => Some(SuspectStatus::Trusted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SuspectStatus::Pending)
    }
}

impl std::fmt::Display for SuspectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected message awaiting (or past) moderator adjudication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspectRecord {
    pub id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    /// The message text captured at detection time (None for media without caption)
    pub suspect_message: Option<String>,
    /// Classifier confidence when the statistical path produced the verdict
    pub confidence: Option<f64>,
    pub status: SuspectStatus,
    pub created_at: String,
}

/// Everything needed to insert a new pending suspect record.
#[derive(Debug, Clone)]
pub struct NewSuspect {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub text: Option<String>,
    pub confidence: Option<f64>,
}

/// A labeled example produced by a moderator decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub id: i64,
    pub text: String,
    /// 0 = benign, 1 = suspicious
    pub label: i64,
    pub moderator_id: i64,
    pub processed: bool,
    pub created_at: String,
}

/// Aggregate counts over the training_examples table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub total: i64,
    /// Examples labeled benign (0)
    pub good: i64,
    /// Examples labeled suspicious (1)
    pub bad: i64,
    pub unprocessed: i64,
}

/// Number of suspect records in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspectCounts {
    pub pending: i64,
    pub skipped: i64,
    pub banned: i64,
    pub trusted: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SuspectStatus::Pending,
            SuspectStatus::Skipped,
            SuspectStatus::Banned,
            SuspectStatus::Trusted,
        ] {
            assert_eq!(SuspectStatus::parse(status.as_str()), Some(status));
            assert_eq!(status.to_string(), status.as_str());
        }
        assert_eq!(SuspectStatus::parse("deleted"), None);
    }

    #[test]
    fn test_only_pending_is_non_terminal() {
        assert!(!SuspectStatus::Pending.is_terminal());
        assert!(SuspectStatus::Skipped.is_terminal());
        assert!(SuspectStatus::Banned.is_terminal());
        assert!(SuspectStatus::Trusted.is_terminal());
    }
}
