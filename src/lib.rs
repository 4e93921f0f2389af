// src/lib.rs

//! Entropy package matching engine
//!
//! Repository-backed dependency resolution for a binary package manager
//! layered on top of Portage metadata.
//!
//! # Architecture
//!
//! - Atoms: textual package specifiers parsed into structured constraints
//! - Repository stores: one SQLite database per repository, queried read-mostly
//! - Matcher: resolves atoms across repositories with deterministic tie-breaks
//! - Object cache: asynchronous, fingerprint-keyed on-disk memoization
//! - Maintenance: cache warm-up and cleanup entry points

pub mod cache;
pub mod config;
pub mod db;
pub mod dep;
mod error;
pub mod maintenance;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod version;

pub use cache::{Fingerprint, ObjectCache};
pub use config::{RepositoryConfig, SelectionKind, Settings};
pub use dep::{Atom, Operator, ParseError, ParseErrorKind};
pub use error::{Error, Result};
pub use resolver::{MatchOptions, MatchResult, Scope};
pub use session::Session;
pub use version::{EntropyVersion, Version};
