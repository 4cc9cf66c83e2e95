//! Database schema migrations.
//!
//! Migrations are applied sequentially, one version at a time, each in its
//! own transaction. The system refuses to open a database with a schema
//! version newer than [`CURRENT_VERSION`].
//!
//! To add a migration: increment [`CURRENT_VERSION`], append a `Migration`
//! entry whose `from_version` equals the previous current version, and keep
//! the SQL idempotent (`IF NOT EXISTS` / `IF EXISTS`).

use crate::{Result, StoreError};
use rusqlite::Connection;
use tracing::info;

/// Current database schema version.
pub const CURRENT_VERSION: i32 = 2;

/// A single schema migration from one version to the next.
struct Migration {
    from_version: i32,
    to_version: i32,
    upgrade_sql: &'static str,
    description: &'static str,
}

/// Registry of all migrations, ordered by version.
const MIGRATIONS: &[Migration] = &[Migration {
    from_version: 1,
    to_version: 2,
    upgrade_sql: r#"
        ALTER TABLE nodes ADD COLUMN is_public INTEGER NOT NULL DEFAULT 0;
    "#,
    description: "Track the public/private flag advertised by pods",
}];

/// Retrieves the current schema version.
///
/// Returns 1 if no version is recorded (the initial schema predates
/// versioning).
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, _> = conn.query_row(
        "SELECT state FROM app_state WHERE statename = 'databaseschema'",
        [],
        |row| row.get(0),
    );

    match result {
        Ok(version_str) => version_str
            .parse()
            .map_err(|_| StoreError::Migration(format!("Invalid schema version: {}", version_str))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(1),
        Err(e) => Err(e.into()),
    }
}

/// Records the schema version after a successful migration.
pub fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO app_state (statename, state) VALUES ('databaseschema', ?)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Whether the database schema is older than [`CURRENT_VERSION`].
pub fn needs_migration(conn: &Connection) -> Result<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < CURRENT_VERSION)
}

/// Runs all necessary migrations to bring the database up to date.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let mut current_version = get_schema_version(conn)?;

    if current_version == CURRENT_VERSION {
        info!("Database is up to date at version {}", current_version);
        return Ok(());
    }

    if current_version > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "Database version {} is newer than supported version {}",
            current_version, CURRENT_VERSION
        )));
    }

    info!(
        "Migrating database from version {} to {}",
        current_version, CURRENT_VERSION
    );

    while current_version < CURRENT_VERSION {
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.from_version == current_version)
            .ok_or_else(|| {
                StoreError::Migration(format!(
                    "No migration found from version {}",
                    current_version
                ))
            })?;

        info!(
            "Applying migration {} -> {}: {}",
            migration.from_version, migration.to_version, migration.description
        );

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.upgrade_sql)?;
        set_schema_version(&tx, migration.to_version)?;
        tx.commit()?;

        current_version = migration.to_version;
    }

    info!("All migrations complete, database at version {}", CURRENT_VERSION);
    Ok(())
}

/// Verifies the schema is exactly [`CURRENT_VERSION`].
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version < CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "Database schema version {} is too old, run migrations first",
            version
        )));
    }

    if version > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "Database schema version {} is newer than this software supports ({})",
            version, CURRENT_VERSION
        )));
    }

    Ok(())
}

/// Initializes a fresh database with the current schema.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(crate::schema::CREATE_SCHEMA)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    info!("Initialized database with schema version {}", CURRENT_VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    /// The pre-versioning schema: no is_public column, no version row.
    const V1_SCHEMA: &str = r#"
        CREATE TABLE app_state (statename TEXT PRIMARY KEY, state TEXT NOT NULL);
        CREATE TABLE nodes (
            ip TEXT PRIMARY KEY,
            credits INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'unknown'
        );
    "#;

    #[test]
    fn fresh_schema_reports_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(!needs_migration(&conn).unwrap());
    }

    #[test]
    fn unversioned_database_is_treated_as_v1() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V1_SCHEMA).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert!(needs_migration(&conn).unwrap());
    }

    #[test]
    fn migration_adds_is_public_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V1_SCHEMA).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
        // Column exists and is readable.
        let is_public: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('nodes') WHERE name = 'is_public'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(is_public, 1);
    }

    #[test]
    fn refuses_newer_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        set_schema_version(&conn, CURRENT_VERSION + 1).unwrap();
        assert!(verify_schema(&conn).is_err());
        assert!(run_migrations(&conn).is_err());
    }
}
