//! Versioned schema for the key-value tables.
//!
//! Each migration is a static SQL batch with a version number. Applied
//! versions are recorded in `_migrations`, so running the set twice is a
//! no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema: kv_entries for scalar and JSON values",
        sql: r#"
            CREATE TABLE kv_entries (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                key        TEXT NOT NULL UNIQUE,
                kind       TEXT NOT NULL CHECK(kind IN ('value','set')),
                value      TEXT,
                updated_at INTEGER NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        description: "set members: kv_set_members keyed by owning entry",
        sql: r#"
            CREATE TABLE kv_set_members (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id INTEGER NOT NULL REFERENCES kv_entries(id) ON DELETE CASCADE,
                member   TEXT NOT NULL,
                UNIQUE(entry_id, member)
            );
            CREATE INDEX idx_kv_set_members_entry ON kv_set_members(entry_id);
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Run all pending migrations against `conn`.
///
/// Synchronous; call it from `spawn_blocking` (see [`crate::Database`]).
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let mut applied = 0usize;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(current_version = current, "key-value schema is up to date");
    } else {
        info!(
            from_version = current,
            applied,
            "key-value schema migrated"
        );
    }
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| migration_error(0, "failed to read current version", e))
}

// ── internals ────────────────────────────────────────────────────────

fn migration_error(version: u32, what: &str, err: rusqlite::Error) -> StoreError {
    StoreError::Migration {
        version,
        message: format!("{what}: {err}"),
    }
}

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| migration_error(0, "failed to create _migrations table", e))
}

/// Apply one migration and record it, atomically.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );
    let version = migration.version;

    // The connection is shared behind `&`, so the transaction is unchecked;
    // the caller holds the connection mutex for the whole call.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| migration_error(version, "failed to begin transaction", e))?;

    let result = tx
        .execute_batch(migration.sql)
        .map_err(|e| migration_error(version, "SQL execution failed", e))
        .and_then(|()| {
            tx.execute(
                "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![version, migration.description, chrono::Utc::now().timestamp()],
            )
            .map_err(|e| migration_error(version, "failed to record migration", e))
        });

    match result {
        Ok(_) => tx
            .commit()
            .map_err(|e| migration_error(version, "failed to commit", e)),
        Err(err) => {
            warn!(version, %err, "migration failed, rolling back");
            // Dropping `tx` rolls back.
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[1].version > window[0].version,
                "migration versions must be strictly increasing: {} >= {}",
                window[0].version,
                window[1].version,
            );
        }
    }

    /// The expected latest migration version (update when adding migrations).
    const LATEST_VERSION: u32 = 2;

    #[test]
    fn run_all_on_fresh_db() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let version = current_version(&conn).unwrap();
        assert_eq!(version, LATEST_VERSION);
    }

    #[test]
    fn run_all_is_idempotent() {
        let conn = setup_conn();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let version = current_version(&conn).unwrap();
        assert_eq!(version, LATEST_VERSION);
    }

    #[test]
    fn kind_check_rejects_unknown_kinds() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        let bad = conn.execute(
            "INSERT INTO kv_entries (key, kind, value, updated_at) VALUES ('k', 'hash', NULL, 0)",
            [],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn set_members_cascade_with_their_entry() {
        let conn = setup_conn();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO kv_entries (key, kind, value, updated_at) VALUES ('s', 'set', NULL, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO kv_set_members (entry_id, member) \
             SELECT id, 'a' FROM kv_entries WHERE key = 's'",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM kv_entries WHERE key = 's'", [])
            .unwrap();

        let members: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_set_members", [], |row| row.get(0))
            .unwrap();
        assert_eq!(members, 0);
    }
}
