// src/repository/sqlite.rs

//! SQLite-backed repository store

use super::RepositoryStore;
use crate::db::{self, models::PackageRecord, models::StoreInfo};
use crate::error::Result;
use rusqlite::{Connection, params};
use tracing::{debug, info};

/// One repository database file
pub struct SqliteRepository {
    id: String,
    conn: Connection,
}

impl SqliteRepository {
    /// Open an existing repository database
    pub fn open(id: &str, db_path: &str) -> Result<Self> {
        let conn = db::open(db_path)?;
        debug!("Opened repository {} from {}", id, db_path);
        Ok(Self {
            id: id.to_string(),
            conn,
        })
    }

    /// Create (or open) a repository database, initializing its schema
    pub fn create(id: &str, db_path: &str) -> Result<Self> {
        let conn = db::init(db_path)?;
        Ok(Self {
            id: id.to_string(),
            conn,
        })
    }

    /// Open an empty in-memory repository
    pub fn open_in_memory(id: &str) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            conn: db::open_in_memory()?,
        })
    }

    /// Insert records exactly as given, bumping the store revision once
    pub fn add_packages(&mut self, records: &mut [PackageRecord]) -> Result<Vec<i64>> {
        let ids = db::transaction(&mut self.conn, |tx| {
            let mut ids = Vec::with_capacity(records.len());
            for record in records.iter_mut() {
                ids.push(record.insert(tx)?);
            }
            StoreInfo::bump_revision(tx)?;
            Ok(ids)
        })?;
        debug!("Added {} package(s) to {}", ids.len(), self.id);
        Ok(ids)
    }

    /// Insert one record exactly as given
    pub fn add_package(&mut self, record: &mut PackageRecord) -> Result<i64> {
        let ids = self.add_packages(std::slice::from_mut(record))?;
        Ok(ids[0])
    }

    /// Commit a package, replacing the previous entry for its
    /// (key, slot, tag, branch)
    ///
    /// The record gets the next entropy revision for its (key, slot, tag).
    pub fn commit_package(&mut self, record: &mut PackageRecord) -> Result<i64> {
        let id = db::transaction(&mut self.conn, |tx| {
            let previous = PackageRecord::find_id(
                tx,
                &record.category,
                &record.name,
                &record.slot,
                record.tag.as_deref(),
                &record.branch,
            )?;

            record.revision = PackageRecord::max_revision(
                tx,
                &record.category,
                &record.name,
                &record.slot,
                record.tag.as_deref(),
            )?
            .map_or(0, |rev| rev + 1);

            for old_id in previous {
                PackageRecord::delete(tx, old_id)?;
            }

            let id = record.insert(tx)?;
            StoreInfo::bump_revision(tx)?;
            Ok(id)
        })?;

        info!(
            "Committed {} revision {} to {} as id {}",
            record.atom, record.revision, self.id, id
        );
        Ok(id)
    }

    /// Remove a package by id; returns whether it existed
    pub fn remove_package(&mut self, id: i64) -> Result<bool> {
        let removed = db::transaction(&mut self.conn, |tx| {
            let removed = PackageRecord::delete(tx, id)?;
            if removed {
                StoreInfo::bump_revision(tx)?;
            }
            Ok(removed)
        })?;
        if removed {
            debug!("Removed package {} from {}", id, self.id);
        }
        Ok(removed)
    }

    fn query_ids<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map(params, |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

impl RepositoryStore for SqliteRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn list_package_ids(&self) -> Result<Vec<i64>> {
        self.query_ids("SELECT id FROM packages ORDER BY id", [])
    }

    fn get_record(&self, id: i64) -> Result<Option<PackageRecord>> {
        PackageRecord::find_by_id(&self.conn, id)
    }

    fn match_info(&self, id: i64) -> Result<Option<PackageRecord>> {
        PackageRecord::find_header_by_id(&self.conn, id)
    }

    fn search_by_key(&self, category: &str, name: &str) -> Result<Vec<i64>> {
        self.query_ids(
            "SELECT id FROM packages WHERE category = ?1 AND name = ?2 ORDER BY id",
            params![category, name],
        )
    }

    fn search_by_name(&self, name: &str) -> Result<Vec<i64>> {
        self.query_ids(
            "SELECT id FROM packages WHERE name = ?1 ORDER BY id",
            params![name],
        )
    }

    fn keys_for_name(&self, name: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT category || '/' || name FROM packages WHERE name = ?1 ORDER BY 1",
        )?;
        let keys = stmt
            .query_map([name], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn search_by_exact_path(&self, path: &str) -> Result<Vec<i64>> {
        self.query_ids(
            "SELECT DISTINCT package_id FROM content WHERE path = ?1 ORDER BY package_id",
            params![path],
        )
    }

    fn search_by_provided_library(&self, soname: &str, arch: &str) -> Result<Vec<i64>> {
        self.query_ids(
            "SELECT DISTINCT package_id FROM provided_libs
             WHERE library = ?1 AND arch = ?2 ORDER BY package_id",
            params![soname, arch],
        )
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        self.query_strings("SELECT DISTINCT category || '/' || name FROM packages ORDER BY 1")
    }

    fn list_dependencies(&self) -> Result<Vec<String>> {
        self.query_strings("SELECT DISTINCT dependency FROM dependencies ORDER BY 1")
    }

    fn list_atoms(&self) -> Result<Vec<String>> {
        self.query_strings("SELECT DISTINCT atom FROM packages ORDER BY 1")
    }

    fn revision(&self) -> Result<i64> {
        StoreInfo::revision(&self.conn)
    }
}
