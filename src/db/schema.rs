// src/db/schema.rs

//! Database schema definitions and migrations for repository stores
//!
//! This module defines the SQLite schema for package records and provides
//! a migration system to evolve the schema over time.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
///
/// Creates the package record tables:
/// - packages: one row per package id
/// - dependencies: ordered dependency strings
/// - content: files owned by each package
/// - provided_libs: shared libraries provided by each package
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- Packages: one record per (key, version, slot, tag, revision, branch)
        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            atom TEXT NOT NULL,
            category TEXT NOT NULL,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            slot TEXT NOT NULL DEFAULT '0',
            tag TEXT NOT NULL DEFAULT '',
            revision INTEGER NOT NULL DEFAULT 0,
            branch TEXT NOT NULL,
            chost TEXT,
            cflags TEXT,
            cxxflags TEXT,
            size INTEGER NOT NULL DEFAULT 0,
            UNIQUE(category, name, version, slot, tag, revision, branch)
        );

        CREATE INDEX idx_packages_key ON packages(category, name);
        CREATE INDEX idx_packages_name ON packages(name);

        -- Dependencies: order is preserved for display
        CREATE TABLE dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            dependency TEXT NOT NULL,
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_dependencies_package_id ON dependencies(package_id);
        CREATE INDEX idx_dependencies_dependency ON dependencies(dependency);

        -- Content: file paths owned by each package
        CREATE TABLE content (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            path TEXT NOT NULL,
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_content_package_id ON content(package_id);
        CREATE INDEX idx_content_path ON content(path);

        -- Provided libraries: soname + ELF class
        CREATE TABLE provided_libs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            library TEXT NOT NULL,
            path TEXT NOT NULL,
            arch TEXT NOT NULL,
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_provided_libs_package_id ON provided_libs(package_id);
        CREATE INDEX idx_provided_libs_library ON provided_libs(library, arch);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: Add use flags and the store revision counter
///
/// - useflags: enabled use flags per package
/// - store_info: key/value metadata, seeded with `revision = 0`
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE useflags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            flag TEXT NOT NULL,
            UNIQUE(package_id, flag),
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_useflags_package_id ON useflags(package_id);

        CREATE TABLE store_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        INSERT INTO store_info (key, value) VALUES ('revision', '0');
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 0);

        set_schema_version(&conn, 1).unwrap();
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "packages",
            "dependencies",
            "content",
            "provided_libs",
            "useflags",
            "store_info",
            "schema_version",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();
        let version1 = get_schema_version(&conn).unwrap();

        migrate(&conn).unwrap();
        let version2 = get_schema_version(&conn).unwrap();

        assert_eq!(version1, version2);
        assert_eq!(version1, SCHEMA_VERSION);
    }

    #[test]
    fn test_revision_seeded() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let revision: String = conn
            .query_row("SELECT value FROM store_info WHERE key = 'revision'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(revision, "0");
    }

    #[test]
    fn test_packages_table_constraints() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let insert = "INSERT INTO packages (atom, category, name, version, slot, tag, revision, branch)
                      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
        let row = ["app-foo/foo-1.0", "app-foo", "foo", "1.0", "0", "", "0", "5"];

        conn.execute(insert, row).unwrap();

        // Same identity tuple must be rejected
        assert!(conn.execute(insert, row).is_err());

        // Another branch is a distinct record
        let other = ["app-foo/foo-1.0", "app-foo", "foo", "1.0", "0", "", "0", "6"];
        assert!(conn.execute(insert, other).is_ok());
    }

    #[test]
    fn test_foreign_key_constraints() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO content (package_id, path) VALUES (?1, ?2)",
            rusqlite::params![999, "/usr/bin/test"],
        );
        assert!(result.is_err());
    }
}
