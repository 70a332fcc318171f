// Database schema — table creation and migrations.
//
// Same version-based approach as always: a `schema_version` table tracks
// which migrations have run, and each migration is a function that executes
// SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Authors exempt from detection (created by the 'trust' action)
        CREATE TABLE IF NOT EXISTS trusted_users (
            user_id INTEGER PRIMARY KEY,
            username TEXT,
            full_name TEXT,
            added_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per detected message
        CREATE TABLE IF NOT EXISTS suspects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            username TEXT,
            full_name TEXT,
            suspect_message TEXT,              -- captured text, NULL for media
            confidence REAL,                   -- classifier confidence, NULL for rule hits
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'skipped', 'banned', 'trusted')),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            decided_at TEXT
        );

        -- Moderator-labeled examples for the feedback loop
        CREATE TABLE IF NOT EXISTS training_examples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            label INTEGER NOT NULL CHECK (label IN (0, 1)),
            moderator_id INTEGER NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Lookup by message identity
        CREATE INDEX IF NOT EXISTS idx_suspects_message
            ON suspects(message_id);

        -- Feedback loop scans for unprocessed rows
        CREATE INDEX IF NOT EXISTS idx_examples_processed
            ON training_examples(processed);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: at most one pending record per message identity.
    // Moderator callbacks are keyed by message id alone, so a second pending
    // row would make the single-decision guarantee ambiguous.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_suspects_one_pending
                ON suspects(message_id) WHERE status = 'pending';",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, trusted_users, suspects, training_examples
        assert_eq!(table_count(&conn).unwrap(), 4);
    }

    #[test]
    fn test_second_pending_row_for_same_message_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        conn.execute(
            "INSERT INTO suspects (chat_id, message_id, user_id) VALUES (1, 42, 7)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO suspects (chat_id, message_id, user_id) VALUES (1, 42, 7)",
            [],
        );
        assert!(dup.is_err());

        // Once decided, a fresh pending row for the same message is allowed
        conn.execute(
            "UPDATE suspects SET status = 'skipped' WHERE message_id = 42",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO suspects (chat_id, message_id, user_id) VALUES (1, 42, 7)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_label_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let bad = conn.execute(
            "INSERT INTO training_examples (text, label, moderator_id) VALUES ('x', 2, 1)",
            [],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_migrations_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2]);
    }
}
