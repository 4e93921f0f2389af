// src/config.rs

//! Client settings
//!
//! Settings are read from a TOML file:
//!
//! ```toml
//! branch = "5"
//! cache_dir = "/var/lib/entropy/caches"
//! installed = "/var/lib/entropy/client/installed.db"
//! selection = "priority"
//!
//! [[repositories]]
//! id = "main"
//! path = "/var/lib/entropy/repos/main/packages.db"
//!
//! [[repositories]]
//! id = "extra"
//! path = "/var/lib/entropy/repos/extra/packages.db"
//! enabled = false
//!
//! package_mask = [">=dev-libs/openssl-4"]
//! package_unmask = ["=dev-libs/openssl-4.0.1"]
//!
//! [symlinks]
//! "/usr/lib" = ["/usr/lib64"]
//! ```
//!
//! The order of `[[repositories]]` is the repository priority order.

use crate::error::{Error, Result};
use crate::repository::{INSTALLED_REPOSITORY_ID, SymlinkMap};
use crate::resolver::PackageMasks;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default settings file location
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/entropy/equo.toml";

/// How matches from several repositories are arbitrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    /// The first repository in priority order with a candidate wins
    #[default]
    Priority,
    /// The newest candidate across all repositories wins
    Newest,
}

impl SelectionKind {
    pub fn as_str(&self) -> &str {
        match self {
            SelectionKind::Priority => "priority",
            SelectionKind::Newest => "newest",
        }
    }
}

/// One configured repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    /// Path of the repository database
    pub path: PathBuf,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RepositoryConfig {
    pub fn new(id: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.to_string(),
            path: path.into(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Active branch; only packages on it are matched
    pub branch: String,
    /// Repositories in priority order
    pub repositories: Vec<RepositoryConfig>,
    /// Installed-packages database
    pub installed: Option<PathBuf>,
    pub cache_dir: PathBuf,
    pub live_cache_capacity: usize,
    pub write_buffer_capacity: usize,
    /// Fail on ambiguous bare package names instead of picking one
    pub strict_keys: bool,
    pub selection: SelectionKind,
    /// Directory aliases used by file ownership lookups
    pub symlinks: SymlinkMap,
    /// Atoms hidden from repository matches
    pub package_mask: Vec<String>,
    /// Atoms exempt from `package_mask`
    pub package_unmask: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            branch: "5".to_string(),
            repositories: Vec::new(),
            installed: None,
            cache_dir: PathBuf::from("/var/lib/entropy/caches"),
            live_cache_capacity: 512,
            write_buffer_capacity: 4096,
            strict_keys: false,
            selection: SelectionKind::Priority,
            symlinks: SymlinkMap::new(),
            package_mask: Vec::new(),
            package_unmask: Vec::new(),
        }
    }
}

impl Settings {
    /// Load and validate settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let settings: Settings = toml::from_str(&data)
            .map_err(|e| Error::Config(format!("Invalid settings in {}: {}", path.display(), e)))?;
        settings.validate()?;
        debug!(
            "Loaded settings from {} ({} repositories, branch {})",
            path.display(),
            settings.repositories.len(),
            settings.branch
        );
        Ok(settings)
    }

    /// Reject duplicate or unusable repository identifiers and malformed
    /// mask entries
    pub fn validate(&self) -> Result<()> {
        if self.branch.is_empty() {
            return Err(Error::Config("branch must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if repo.id.is_empty()
                || repo.id.contains([',', '@', ':', '/'])
                || repo.id.chars().any(char::is_whitespace)
            {
                return Err(Error::Config(format!("Invalid repository id '{}'", repo.id)));
            }
            if repo.id == INSTALLED_REPOSITORY_ID {
                return Err(Error::Config(format!(
                    "Repository id '{}' is reserved",
                    INSTALLED_REPOSITORY_ID
                )));
            }
            if !seen.insert(repo.id.as_str()) {
                return Err(Error::Config(format!("Duplicate repository id '{}'", repo.id)));
            }
        }
        PackageMasks::from_settings(self)?;
        Ok(())
    }

    /// Enabled repositories in priority order
    pub fn enabled_repositories(&self) -> Vec<&RepositoryConfig> {
        self.repositories.iter().filter(|r| r.enabled).collect()
    }

    /// Enabled repository identifiers in priority order
    pub fn repository_order(&self) -> Vec<String> {
        self.enabled_repositories()
            .into_iter()
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn repository(&self, id: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.id == id)
    }
}
