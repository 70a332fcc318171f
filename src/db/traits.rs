// Database trait — backend-agnostic async interface for all DB operations.
//
// This is the persistence collaborator the core consumes: the state machine,
// the intake path, and the training loop only ever see `Arc<dyn Database>`.
// All methods are async so a sync backend (rusqlite behind a Mutex) and a
// native async backend fit behind the same interface.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    NewSuspect, SuspectCounts, SuspectRecord, SuspectStatus, TrainingExample, TrainingStats,
};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Trusted users ---

    /// Whether the author is exempt from detection.
    async fn is_trusted(&self, user_id: i64) -> Result<bool>;

    /// Add (or refresh) an allowlist entry.
    async fn add_trusted_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<()>;

    // --- Suspects ---

    /// Insert a pending record. Returns false when one is already pending
    /// for the same message.
    async fn add_suspect_record(&self, suspect: &NewSuspect) -> Result<bool>;

    /// The pending record for a message, if any.
    async fn get_pending_suspect(&self, message_id: i64) -> Result<Option<SuspectRecord>>;

    /// The latest record for a message in any status.
    async fn get_suspect_record(&self, message_id: i64) -> Result<Option<SuspectRecord>>;

    /// Unconditional status update.
    async fn update_suspect_status(&self, message_id: i64, status: SuspectStatus) -> Result<()>;

    /// Conditional update: pending -> `status`. Returns whether this call
    /// performed the transition.
    async fn transition_suspect(&self, message_id: i64, status: SuspectStatus) -> Result<bool>;

    /// Record counts per status.
    async fn get_suspect_counts(&self) -> Result<SuspectCounts>;

    // --- Training examples ---

    /// Store a labeled example and return its ID.
    async fn add_training_example(&self, text: &str, label: i64, moderator_id: i64)
        -> Result<i64>;

    /// Examples with processed = false.
    async fn get_unprocessed_training_examples(&self) -> Result<Vec<TrainingExample>>;

    /// Mark exactly these examples processed (all-or-nothing).
    async fn mark_training_examples_processed(&self, ids: &[i64]) -> Result<()>;

    /// Totals for the status display.
    async fn get_training_stats(&self) -> Result<TrainingStats>;
}
