//! Cache store schema.
//!
//! Version 1 creates `caches` (one row per generation, creation order by
//! rowid) and `entries` (one row per stored variant, removed with its cache
//! through `ON DELETE CASCADE`). Applied versions are recorded in
//! `_migrations`; each batch commits together with its record, so a failed
//! batch leaves the store at the previous version.

use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, params};

use super::Error;

/// One schema step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Steps in ascending version order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "caches",
    sql: include_str!("../../migrations/001_caches.sql"),
}];

/// Bring the store up to the latest schema version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| apply(conn, MIGRATIONS)).await.map_err(Error::from)
}

/// Highest applied version, or 0 for a fresh store.
pub fn current_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
}

fn apply(conn: &mut rusqlite::Connection, migrations: &[Migration]) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let mut current = current_version(conn)?;

    for migration in migrations {
        if migration.version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
        tx.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        tracing::info!(version = migration.version, name = migration.name, "applied cache schema migration");
        current = migration.version;
    }

    Ok(())
}
