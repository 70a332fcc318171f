// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Holding the lock for the whole statement is also what makes
// `transition_suspect` a true compare-and-set across concurrent callers.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{
    NewSuspect, SuspectCounts, SuspectRecord, SuspectStatus, TrainingExample, TrainingStats,
};
use super::queries;
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory database with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn is_trusted(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::is_trusted(&conn, user_id)
    }

    async fn add_trusted_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::add_trusted_user(&conn, user_id, username, full_name)
    }

    async fn add_suspect_record(&self, suspect: &NewSuspect) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::add_suspect_record(&conn, suspect)
    }

    async fn get_pending_suspect(&self, message_id: i64) -> Result<Option<SuspectRecord>> {
        let conn = self.conn.lock().await;
        queries::get_pending_suspect(&conn, message_id)
    }

    async fn get_suspect_record(&self, message_id: i64) -> Result<Option<SuspectRecord>> {
        let conn = self.conn.lock().await;
        queries::get_suspect_record(&conn, message_id)
    }

    async fn update_suspect_status(&self, message_id: i64, status: SuspectStatus) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::update_suspect_status(&conn, message_id, status)
    }

    async fn transition_suspect(&self, message_id: i64, status: SuspectStatus) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::transition_suspect(&conn, message_id, status)
    }

    async fn get_suspect_counts(&self) -> Result<SuspectCounts> {
        let conn = self.conn.lock().await;
        queries::get_suspect_counts(&conn)
    }

    async fn add_training_example(
        &self,
        text: &str,
        label: i64,
        moderator_id: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::add_training_example(&conn, text, label, moderator_id)
    }

    async fn get_unprocessed_training_examples(&self) -> Result<Vec<TrainingExample>> {
        let conn = self.conn.lock().await;
        queries::get_unprocessed_training_examples(&conn)
    }

    async fn mark_training_examples_processed(&self, ids: &[i64]) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::mark_training_examples_processed(&conn, ids)
    }

    async fn get_training_stats(&self) -> Result<TrainingStats> {
        let conn = self.conn.lock().await;
        queries::get_training_stats(&conn)
    }
}
