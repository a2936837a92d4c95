//! Database schema migrations for SQLite.
//!
//! Simple versioned migrations. Each version transforms the schema from
//! N to N+1 inside a single transaction.

use rusqlite::Connection;

use sealfile_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated envelope store schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: envelopes, recipient index, key directory, keyring.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Sealed files, stored whole as CBOR
        CREATE TABLE envelopes (
            file_id TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            envelope BLOB NOT NULL,
            created_at INTEGER NOT NULL,       -- metadata.createdAt (Unix ms)
            expires_at INTEGER,                -- metadata.expiresAt, nullable
            stored_at INTEGER NOT NULL         -- local timestamp of insertion
        );

        -- Recipient index, emails normalized
        CREATE TABLE envelope_recipients (
            file_id TEXT NOT NULL REFERENCES envelopes(file_id) ON DELETE CASCADE,
            email TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (file_id, email)
        );

        -- Public-key directory
        CREATE TABLE public_keys (
            email TEXT PRIMARY KEY,
            public_key TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Local keyring, private keys locked under the keyring key
        CREATE TABLE private_keys (
            email TEXT PRIMARY KEY,
            locked_key TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Passphrase salt, Argon2id cost and verifier; at most one row
        CREATE TABLE keyring_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            salt BLOB NOT NULL,
            memory_kib INTEGER NOT NULL,
            iterations INTEGER NOT NULL,
            parallelism INTEGER NOT NULL,
            verifier BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_envelope_recipients_email ON envelope_recipients(email);
        CREATE INDEX idx_envelopes_expires ON envelopes(expires_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "envelopes",
            "envelope_recipients",
            "public_keys",
            "private_keys",
            "keyring_meta",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_rejects_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
