// src/repository/index.rs

//! JSON repository indexes
//!
//! An index is the exchange format used to populate a store:
//!
//! ```json
//! {
//!   "name": "main",
//!   "branch": "5",
//!   "packages": [
//!     { "category": "app-foo", "name": "foo", "version": "1.0",
//!       "dependencies": [">=sys-libs/zlib-1.2"] }
//!   ]
//! }
//! ```

use super::SqliteRepository;
use crate::db::models::{PackageRecord, ProvidedLibrary};
use crate::dep::{Atom, is_valid_package_tag};
use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Repository index format
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryIndex {
    pub name: String,
    /// Default branch for packages that do not name one
    pub branch: String,
    pub packages: Vec<PackageMetadata>,
}

/// Package metadata in a repository index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub category: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    /// Explicit entropy revision; assigned on commit when absent
    #[serde(default)]
    pub revision: Option<i64>,
    #[serde(default)]
    pub branch: Option<String>,
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

impl PackageMetadata {
    /// Validate and convert into a store record
    pub fn into_record(self, default_branch: &str) -> Result<PackageRecord> {
        let key = format!("{}/{}", self.category, self.name);
        let atom = Atom::parse(&key)?;
        if atom.version.is_some() {
            return Err(Error::Config(format!(
                "Package name '{}' must not carry a version",
                key
            )));
        }
        Version::parse(&self.version)?;
        if let Some(tag) = &self.tag
            && !is_valid_package_tag(tag)
        {
            return Err(Error::Config(format!("Invalid tag '{}' for {}", tag, key)));
        }

        let mut record = PackageRecord::new(
            self.category,
            self.name,
            self.version,
            self.branch.unwrap_or_else(|| default_branch.to_string()),
        );
        if let Some(slot) = self.slot {
            record.slot = slot;
        }
        record.tag = self.tag.filter(|t| !t.is_empty());
        record.revision = self.revision.unwrap_or(0);
        record.chost = self.chost;
        record.cflags = self.cflags;
        record.cxxflags = self.cxxflags;
        record.size = self.size;
        record.dependencies = self.dependencies;
        record.content = self.content;
        record.provided_libs = self.provided_libs;
        record.useflags = self.useflags;
        Ok(record)
    }
}

impl RepositoryIndex {
    /// Read an index file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let index: RepositoryIndex = serde_json::from_str(&data)?;
        Ok(index)
    }
}

/// Load a JSON repository index into `store`
///
/// Packages with an explicit revision are added as given; the rest are
/// committed and receive the next revision for their (key, slot, tag).
/// Invalid entries are skipped with a warning. Returns the number of
/// packages imported.
pub fn import_index(store: &mut SqliteRepository, path: &Path) -> Result<usize> {
    let index = RepositoryIndex::load(path)?;
    info!(
        "Importing {} package(s) from index '{}' ({})",
        index.packages.len(),
        index.name,
        path.display()
    );

    let mut pinned = Vec::new();
    let mut committed = 0;
    for pkg in index.packages {
        let explicit_revision = pkg.revision.is_some();
        let label = format!("{}/{}-{}", pkg.category, pkg.name, pkg.version);
        let mut record = match pkg.into_record(&index.branch) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping {}: {}", label, e);
                continue;
            }
        };
        if explicit_revision {
            pinned.push(record);
        } else {
            store.commit_package(&mut record)?;
            committed += 1;
        }
    }

    if !pinned.is_empty() {
        store.add_packages(&mut pinned)?;
    }

    let total = committed + pinned.len();
    info!("Imported {} package(s) into {}", total, index.name);
    Ok(total)
}
