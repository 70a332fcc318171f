// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{
    NewSuspect, SuspectCounts, SuspectRecord, SuspectStatus, TrainingExample, TrainingStats,
};

// --- Trusted users ---

/// Check whether an author is on the allowlist.
pub fn is_trusted(conn: &Connection, user_id: i64) -> Result<bool> {
    let trusted: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM trusted_users WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(trusted)
}

/// Add an author to the allowlist (upsert — refreshes the stored names).
pub fn add_trusted_user(
    conn: &Connection,
    user_id: i64,
    username: Option<&str>,
    full_name: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO trusted_users (user_id, username, full_name, added_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET username = ?2, full_name = ?3",
        params![user_id, username, full_name],
    )?;
    Ok(())
}

// --- Suspects ---

const SUSPECT_COLUMNS: &str = "id, chat_id, message_id, user_id, username, full_name,
                               suspect_message, confidence, status, created_at";

fn suspect_from_row(row: &Row<'_>) -> rusqlite::Result<SuspectRecord> {
    let status_str: String = row.get(8)?;
    let status = SuspectStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            Type::Text,
            format!("unknown suspect status '{status_str}'").into(),
        )
    })?;
    Ok(SuspectRecord {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        message_id: row.get(2)?,
        user_id: row.get(3)?,
        username: row.get(4)?,
        full_name: row.get(5)?,
        suspect_message: row.get(6)?,
        confidence: row.get(7)?,
        status,
        created_at: row.get(9)?,
    })
}

/// Insert a pending suspect record.
///
/// Returns false (and inserts nothing) when a pending record for the same
/// message already exists — the partial unique index makes this atomic.
pub fn add_suspect_record(conn: &Connection, suspect: &NewSuspect) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO suspects
            (chat_id, message_id, user_id, username, full_name, suspect_message, confidence, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')
         ON CONFLICT DO NOTHING",
        params![
            suspect.chat_id,
            suspect.message_id,
            suspect.user_id,
            suspect.username,
            suspect.full_name,
            suspect.text,
            suspect.confidence,
        ],
    )?;
    Ok(inserted > 0)
}

/// Get the pending record for a message, if any.
pub fn get_pending_suspect(conn: &Connection, message_id: i64) -> Result<Option<SuspectRecord>> {
    let sql = format!(
        "SELECT {SUSPECT_COLUMNS} FROM suspects
         WHERE message_id = ?1 AND status = 'pending'"
    );
    let mut stmt = conn.prepare(&sql)?;
    let result = stmt
        .query_row(params![message_id], suspect_from_row)
        .optional()?;
    Ok(result)
}

/// Get the most recent record for a message regardless of status.
pub fn get_suspect_record(conn: &Connection, message_id: i64) -> Result<Option<SuspectRecord>> {
    let sql = format!(
        "SELECT {SUSPECT_COLUMNS} FROM suspects
         WHERE message_id = ?1
         ORDER BY id DESC LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let result = stmt
        .query_row(params![message_id], suspect_from_row)
        .optional()?;
    Ok(result)
}

/// Unconditionally set the status of every record for a message.
pub fn update_suspect_status(
    conn: &Connection,
    message_id: i64,
    status: SuspectStatus,
) -> Result<()> {
    conn.execute(
        "UPDATE suspects SET status = ?1, decided_at = datetime('now') WHERE message_id = ?2",
        params![status.as_str(), message_id],
    )?;
    Ok(())
}

/// Compare-and-set: move the pending record for a message to `status`.
///
/// Returns true only for the caller whose UPDATE actually changed the row.
/// A second caller racing on the same message sees zero affected rows.
pub fn transition_suspect(
    conn: &Connection,
    message_id: i64,
    status: SuspectStatus,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE suspects SET status = ?1, decided_at = datetime('now')
         WHERE message_id = ?2 AND status = 'pending'",
        params![status.as_str(), message_id],
    )?;
    Ok(changed > 0)
}

/// Number of suspect records per status.
pub fn get_suspect_counts(conn: &Connection) -> Result<SuspectCounts> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM suspects GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = SuspectCounts::default();
    for row in rows {
        let (status, count) = row?;
        match SuspectStatus::parse(&status) {
            Some(SuspectStatus::Pending) => counts.pending = count,
            Some(SuspectStatus::Skipped) => counts.skipped = count,
            Some(SuspectStatus::Banned) => counts.banned = count,
            Some(SuspectStatus::Trusted) => counts.trusted = count,
            None => {}
        }
    }
    Ok(counts)
}

// --- Training examples ---

/// Record a labeled example and return its ID.
pub fn add_training_example(
    conn: &Connection,
    text: &str,
    label: i64,
    moderator_id: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO training_examples (text, label, moderator_id) VALUES (?1, ?2, ?3)",
        params![text, label, moderator_id],
    )
    .with_context(|| format!("Failed to store training example with label {label}"))?;
    Ok(conn.last_insert_rowid())
}

/// All examples not yet consumed by a training run, oldest first.
pub fn get_unprocessed_training_examples(conn: &Connection) -> Result<Vec<TrainingExample>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, label, moderator_id, processed, created_at
         FROM training_examples
         WHERE processed = 0
         ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(TrainingExample {
            id: row.get(0)?,
            text: row.get(1)?,
            label: row.get(2)?,
            moderator_id: row.get(3)?,
            processed: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;

    let mut examples = Vec::new();
    for row in rows {
        examples.push(row?);
    }
    Ok(examples)
}

/// Mark exactly the given examples as processed, in one transaction.
pub fn mark_training_examples_processed(conn: &Connection, ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare("UPDATE training_examples SET processed = 1 WHERE id = ?1")?;
        for id in ids {
            stmt.execute(params![id])?;
        }
    }
    tx.commit().context("Failed to commit processed flags")?;
    Ok(())
}

/// Totals over the training_examples table.
pub fn get_training_stats(conn: &Connection) -> Result<TrainingStats> {
    let stats = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(label = 0), 0),
                COALESCE(SUM(label = 1), 0),
                COALESCE(SUM(processed = 0), 0)
         FROM training_examples",
        [],
        |row| {
            Ok(TrainingStats {
                total: row.get(0)?,
                good: row.get(1)?,
                bad: row.get(2)?,
                unprocessed: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}
