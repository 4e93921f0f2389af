// src/repository/mod.rs

//! Repository stores
//!
//! This module provides:
//! - The [`RepositoryStore`] query surface used by the matcher
//! - A SQLite-backed implementation ([`SqliteRepository`])
//! - Loading JSON repository indexes into a store
//! - Path aliasing for "which package owns this file" lookups

mod index;
mod sqlite;

pub use index::{PackageMetadata, RepositoryIndex, import_index};
pub use sqlite::SqliteRepository;

use crate::db::models::PackageRecord;
use crate::error::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Identifier of the installed-packages pseudo-repository
pub const INSTALLED_REPOSITORY_ID: &str = "installed";

/// Directory aliases: real directory -> symlinks pointing at it
///
/// e.g. `{"/usr/lib": ["/usr/lib64"]}`
pub type SymlinkMap = BTreeMap<String, Vec<String>>;

/// Read-mostly query surface of a single repository
///
/// Queries never mutate the store, so one store can be shared by any number
/// of matcher invocations within a session.
pub trait RepositoryStore {
    /// Repository identifier
    fn id(&self) -> &str;

    /// All live package ids
    fn list_package_ids(&self) -> Result<Vec<i64>>;

    /// Full package record, including content and libraries
    fn get_record(&self, id: i64) -> Result<Option<PackageRecord>>;

    /// Record fields the matcher filters on
    ///
    /// Implementations may leave `content` and `provided_libs` empty.
    fn match_info(&self, id: i64) -> Result<Option<PackageRecord>> {
        self.get_record(id)
    }

    /// All ids with the given category and name, across slots, tags,
    /// revisions and branches
    fn search_by_key(&self, category: &str, name: &str) -> Result<Vec<i64>>;

    /// All ids with the given package name in any category
    fn search_by_name(&self, name: &str) -> Result<Vec<i64>>;

    /// Distinct `category/name` keys for a bare package name
    fn keys_for_name(&self, name: &str) -> Result<Vec<String>> {
        let mut keys = BTreeSet::new();
        for id in self.search_by_name(name)? {
            if let Some(record) = self.match_info(id)? {
                keys.insert(record.key());
            }
        }
        Ok(keys.into_iter().collect())
    }

    /// Ids of packages owning exactly `path`
    fn search_by_exact_path(&self, path: &str) -> Result<Vec<i64>>;

    /// Ids of packages owning `path`, its canonical form, or any alias of it
    fn search_by_content_path(&self, path: &str, symlinks: &SymlinkMap) -> Result<Vec<i64>> {
        let mut ids = BTreeSet::new();
        for candidate in path_aliases(path, symlinks) {
            ids.extend(self.search_by_exact_path(&candidate)?);
        }
        Ok(ids.into_iter().collect())
    }

    /// Ids of packages providing `soname` for the given ELF class
    fn search_by_provided_library(&self, soname: &str, arch: &str) -> Result<Vec<i64>>;

    /// Distinct `category/name` keys
    fn list_keys(&self) -> Result<Vec<String>>;

    /// Distinct dependency strings across all packages
    fn list_dependencies(&self) -> Result<Vec<String>>;

    /// Distinct atom strings
    fn list_atoms(&self) -> Result<Vec<String>>;

    /// Counter bumped on every committed write
    fn revision(&self) -> Result<i64>;
}

/// Expand `path` into every spelling a store may have recorded
///
/// The result contains the path itself, its canonical form when it exists
/// on disk, and each remapping through `symlinks` in both directions.
pub fn path_aliases(path: &str, symlinks: &SymlinkMap) -> Vec<String> {
    let mut seeds = BTreeSet::new();
    seeds.insert(path.to_string());
    if let Ok(real) = std::fs::canonicalize(path)
        && let Some(real) = real.to_str()
    {
        seeds.insert(real.to_string());
    }

    let mut aliases = seeds.clone();
    for seed in &seeds {
        for (real_dir, links) in symlinks {
            for link in links {
                if let Some(rest) = strip_dir_prefix(seed, link) {
                    aliases.insert(format!("{}{}", real_dir.trim_end_matches('/'), rest));
                }
                if let Some(rest) = strip_dir_prefix(seed, real_dir) {
                    aliases.insert(format!("{}{}", link.trim_end_matches('/'), rest));
                }
            }
        }
    }
    aliases.into_iter().collect()
}

// "/usr/lib64/libz.so" minus "/usr/lib64" is "/libz.so"; "/usr/lib64x" does not match.
fn strip_dir_prefix<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(dir)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib_map() -> SymlinkMap {
        let mut map = SymlinkMap::new();
        map.insert("/usr/lib".to_string(), vec!["/usr/lib64".to_string()]);
        map
    }

    #[test]
    fn test_path_aliases_both_directions() {
        let map = lib_map();

        let aliases = path_aliases("/usr/lib64/libfoo.so.1", &map);
        assert!(aliases.contains(&"/usr/lib64/libfoo.so.1".to_string()));
        assert!(aliases.contains(&"/usr/lib/libfoo.so.1".to_string()));

        let aliases = path_aliases("/usr/lib/libfoo.so.1", &map);
        assert!(aliases.contains(&"/usr/lib64/libfoo.so.1".to_string()));
    }

    #[test]
    fn test_path_aliases_respects_component_boundary() {
        let aliases = path_aliases("/usr/lib64x/libfoo.so", &lib_map());
        assert_eq!(aliases, vec!["/usr/lib64x/libfoo.so".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_path_aliases_canonicalizes() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.txt");
        std::fs::write(&real, b"x").unwrap();
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let canonical = std::fs::canonicalize(&real).unwrap();
        let aliases = path_aliases(link.to_str().unwrap(), &SymlinkMap::new());
        assert!(aliases.contains(&canonical.to_str().unwrap().to_string()));
    }
}
