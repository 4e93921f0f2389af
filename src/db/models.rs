// src/db/models.rs

//! Data models for repository store entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading and deleting records.

use crate::dep::Atom;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

const PACKAGE_COLUMNS: &str = "id, atom, category, name, version, slot, tag, revision, branch, chost, cflags, cxxflags, size";

/// A shared library provided by a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedLibrary {
    /// Soname, e.g. `libz.so.1`
    pub library: String,
    /// Absolute path of the library file
    pub path: String,
    /// ELF class, e.g. `x86_64`
    pub arch: String,
}

/// A package record stored in a repository database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub atom: String,
    pub category: String,
    pub name: String,
    pub version: String,
    #[serde(default = "default_slot")]
    pub slot: String,
    /// `None` for untagged packages
    #[serde(default)]
    pub tag: Option<String>,
    /// Entropy revision
    #[serde(default)]
    pub revision: i64,
    pub branch: String,
    #[serde(default)]
    pub chost: Option<String>,
    #[serde(default)]
    pub cflags: Option<String>,
    #[serde(default)]
    pub cxxflags: Option<String>,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub provided_libs: Vec<ProvidedLibrary>,
    #[serde(default)]
    pub useflags: Vec<String>,
}

fn default_slot() -> String {
    "0".to_string()
}

impl PackageRecord {
    /// Create a new, untagged package record in slot `0`
    pub fn new(category: String, name: String, version: String, branch: String) -> Self {
        Self {
            id: None,
            atom: String::new(),
            category,
            name,
            version,
            slot: default_slot(),
            tag: None,
            revision: 0,
            branch,
            chost: None,
            cflags: None,
            cxxflags: None,
            size: 0,
            dependencies: Vec::new(),
            content: Vec::new(),
            provided_libs: Vec::new(),
            useflags: Vec::new(),
        }
    }

    /// `category/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Atom string identifying this exact record
    pub fn compose_atom(&self) -> String {
        Atom::format(
            &self.category,
            &self.name,
            Some(&self.version),
            None,
            self.tag.as_deref(),
            None,
        )
    }

    /// Insert this record and all of its child rows
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        if self.atom.is_empty() {
            self.atom = self.compose_atom();
        }

        conn.execute(
            "INSERT INTO packages (atom, category, name, version, slot, tag, revision, branch, chost, cflags, cxxflags, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &self.atom,
                &self.category,
                &self.name,
                &self.version,
                &self.slot,
                self.tag.as_deref().unwrap_or(""),
                self.revision,
                &self.branch,
                &self.chost,
                &self.cflags,
                &self.cxxflags,
                self.size,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);

        for (position, dependency) in self.dependencies.iter().enumerate() {
            conn.execute(
                "INSERT INTO dependencies (package_id, position, dependency) VALUES (?1, ?2, ?3)",
                params![id, position as i64, dependency],
            )?;
        }
        for path in &self.content {
            conn.execute(
                "INSERT INTO content (package_id, path) VALUES (?1, ?2)",
                params![id, path],
            )?;
        }
        for lib in &self.provided_libs {
            conn.execute(
                "INSERT INTO provided_libs (package_id, library, path, arch) VALUES (?1, ?2, ?3, ?4)",
                params![id, &lib.library, &lib.path, &lib.arch],
            )?;
        }
        for flag in &self.useflags {
            conn.execute(
                "INSERT OR IGNORE INTO useflags (package_id, flag) VALUES (?1, ?2)",
                params![id, flag],
            )?;
        }

        Ok(id)
    }

    /// Find a package record by ID, including its child rows
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM packages WHERE id = ?1",
            PACKAGE_COLUMNS
        ))?;

        let record = stmt.query_row([id], Self::from_row).optional()?;

        match record {
            Some(mut record) => {
                record.dependencies = Self::load_dependencies(conn, id)?;
                record.content = Self::load_content(conn, id)?;
                record.provided_libs = Self::load_provided_libs(conn, id)?;
                record.useflags = Self::load_useflags(conn, id)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Find a record by ID without loading dependencies, content or libraries
    ///
    /// Only use flags are loaded; this is the shape the matcher filters on.
    pub fn find_header_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM packages WHERE id = ?1",
            PACKAGE_COLUMNS
        ))?;

        let record = stmt.query_row([id], Self::from_row).optional()?;

        match record {
            Some(mut record) => {
                record.useflags = Self::load_useflags(conn, id)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Find the id of the record with the given identity tuple
    pub fn find_id(
        conn: &Connection,
        category: &str,
        name: &str,
        slot: &str,
        tag: Option<&str>,
        branch: &str,
    ) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT id FROM packages
             WHERE category = ?1 AND name = ?2 AND slot = ?3 AND tag = ?4 AND branch = ?5
             ORDER BY id",
        )?;

        let ids = stmt
            .query_map(params![category, name, slot, tag.unwrap_or(""), branch], |row| {
                row.get(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    /// Highest entropy revision ever used for (key, slot, tag)
    pub fn max_revision(
        conn: &Connection,
        category: &str,
        name: &str,
        slot: &str,
        tag: Option<&str>,
    ) -> Result<Option<i64>> {
        let revision = conn.query_row(
            "SELECT MAX(revision) FROM packages
             WHERE category = ?1 AND name = ?2 AND slot = ?3 AND tag = ?4",
            params![category, name, slot, tag.unwrap_or("")],
            |row| row.get(0),
        )?;
        Ok(revision)
    }

    /// Delete a record by ID; child rows are cascade-deleted
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM packages WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    fn load_dependencies(conn: &Connection, id: i64) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT dependency FROM dependencies WHERE package_id = ?1 ORDER BY position")?;
        let deps = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(deps)
    }

    fn load_content(conn: &Connection, id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT path FROM content WHERE package_id = ?1 ORDER BY path")?;
        let paths = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    fn load_provided_libs(conn: &Connection, id: i64) -> Result<Vec<ProvidedLibrary>> {
        let mut stmt = conn.prepare(
            "SELECT library, path, arch FROM provided_libs WHERE package_id = ?1 ORDER BY library",
        )?;
        let libs = stmt
            .query_map([id], |row| {
                Ok(ProvidedLibrary {
                    library: row.get(0)?,
                    path: row.get(1)?,
                    arch: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(libs)
    }

    fn load_useflags(conn: &Connection, id: i64) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare_cached("SELECT flag FROM useflags WHERE package_id = ?1 ORDER BY flag")?;
        let flags = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(flags)
    }

    /// Convert a database row to a PackageRecord (child rows left empty)
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let tag: String = row.get(6)?;

        Ok(Self {
            id: Some(row.get(0)?),
            atom: row.get(1)?,
            category: row.get(2)?,
            name: row.get(3)?,
            version: row.get(4)?,
            slot: row.get(5)?,
            tag: if tag.is_empty() { None } else { Some(tag) },
            revision: row.get(7)?,
            branch: row.get(8)?,
            chost: row.get(9)?,
            cflags: row.get(10)?,
            cxxflags: row.get(11)?,
            size: row.get(12)?,
            dependencies: Vec::new(),
            content: Vec::new(),
            provided_libs: Vec::new(),
            useflags: Vec::new(),
        })
    }
}

/// Store-wide metadata kept in the `store_info` table
pub struct StoreInfo;

impl StoreInfo {
    /// Current store revision
    pub fn revision(conn: &Connection) -> Result<i64> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM store_info WHERE key = 'revision'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Increment the store revision and return the new value
    pub fn bump_revision(conn: &Connection) -> Result<i64> {
        let next = Self::revision(conn)? + 1;
        conn.execute(
            "INSERT INTO store_info (key, value) VALUES ('revision', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [next.to_string()],
        )?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn sample_record() -> PackageRecord {
        let mut record = PackageRecord::new(
            "app-foo".to_string(),
            "foo".to_string(),
            "1.2.3".to_string(),
            "5".to_string(),
        );
        record.dependencies = vec![
            ">=sys-libs/zlib-1.2".to_string(),
            "dev-libs/openssl".to_string(),
        ];
        record.content = vec!["/usr/bin/foo".to_string(), "/usr/lib64/libfoo.so.1".to_string()];
        record.provided_libs = vec![ProvidedLibrary {
            library: "libfoo.so.1".to_string(),
            path: "/usr/lib64/libfoo.so.1".to_string(),
            arch: "x86_64".to_string(),
        }];
        record.useflags = vec!["ssl".to_string()];
        record
    }

    #[test]
    fn test_record_insert_and_find() {
        let conn = db::open_in_memory().unwrap();

        let mut record = sample_record();
        let id = record.insert(&conn).unwrap();
        assert!(id > 0);
        assert_eq!(record.atom, "app-foo/foo-1.2.3");

        let found = PackageRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.key(), "app-foo/foo");
        assert_eq!(found.slot, "0");
        assert!(found.tag.is_none());
        // dependency order is preserved
        assert_eq!(found.dependencies, record.dependencies);
        assert_eq!(found.content, record.content);
        assert_eq!(found.provided_libs, record.provided_libs);
        assert_eq!(found.useflags, vec!["ssl".to_string()]);
    }

    #[test]
    fn test_header_skips_content() {
        let conn = db::open_in_memory().unwrap();
        let id = sample_record().insert(&conn).unwrap();

        let header = PackageRecord::find_header_by_id(&conn, id).unwrap().unwrap();
        assert!(header.content.is_empty());
        assert_eq!(header.useflags, vec!["ssl".to_string()]);
    }

    #[test]
    fn test_tagged_record() {
        let conn = db::open_in_memory().unwrap();
        let mut record = sample_record();
        record.tag = Some("4.11.0-sabayon".to_string());
        let id = record.insert(&conn).unwrap();

        assert_eq!(record.atom, "app-foo/foo-1.2.3#4.11.0-sabayon");
        let found = PackageRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.tag.as_deref(), Some("4.11.0-sabayon"));
    }

    #[test]
    fn test_delete_cascades() {
        let conn = db::open_in_memory().unwrap();
        let id = sample_record().insert(&conn).unwrap();

        assert!(PackageRecord::delete(&conn, id).unwrap());
        assert!(PackageRecord::find_by_id(&conn, id).unwrap().is_none());

        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(!PackageRecord::delete(&conn, id).unwrap());
    }

    #[test]
    fn test_max_revision() {
        let conn = db::open_in_memory().unwrap();
        assert_eq!(
            PackageRecord::max_revision(&conn, "app-foo", "foo", "0", None).unwrap(),
            None
        );

        let mut record = sample_record();
        record.revision = 3;
        record.insert(&conn).unwrap();
        assert_eq!(
            PackageRecord::max_revision(&conn, "app-foo", "foo", "0", None).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_store_revision() {
        let conn = db::open_in_memory().unwrap();
        assert_eq!(StoreInfo::revision(&conn).unwrap(), 0);
        assert_eq!(StoreInfo::bump_revision(&conn).unwrap(), 1);
        assert_eq!(StoreInfo::bump_revision(&conn).unwrap(), 2);
        assert_eq!(StoreInfo::revision(&conn).unwrap(), 2);
    }
}
