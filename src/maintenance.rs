// src/maintenance.rs

//! Cache maintenance entry points
//!
//! `generate_cache` warms the object cache by running the matcher over every
//! key, name, atom and dependency string each repository knows about, so
//! later interactive sessions start with hits. `clean_cache` empties it.
//! Both return a process status code.

use crate::error::Result;
use crate::repository::RepositoryStore;
use crate::resolver::MatchOptions;
use crate::session::Session;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Summary of one warm-up run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateStats {
    pub repositories: usize,
    pub queries: usize,
    pub matched: usize,
    pub errors: usize,
}

/// Rebuild the match cache for every enabled repository
///
/// Returns 0 on success, 1 when the cache could not be cleaned or a
/// repository could not be opened.
pub fn generate_cache(session: &Session, verbosity: Verbosity) -> i32 {
    match warm_up(session, verbosity) {
        Some(stats) => {
            if verbosity != Verbosity::Quiet {
                info!(
                    "Cache generated: {} repositories, {} queries, {} matched, {} errors",
                    stats.repositories, stats.queries, stats.matched, stats.errors
                );
            }
            0
        }
        None => 1,
    }
}

fn warm_up(session: &Session, verbosity: Verbosity) -> Option<GenerateStats> {
    if clean_cache(session, Verbosity::Quiet) != 0 {
        return None;
    }

    let matcher = session.matcher();
    let options = MatchOptions::default();
    let mut stats = GenerateStats::default();
    let mut failed = false;

    for id in session.repository_order() {
        let store = match session.store(&id) {
            Ok(store) => store,
            Err(e) => {
                error!("Cannot open repository {}: {}", id, e);
                failed = true;
                continue;
            }
        };

        let queries = match repository_queries(store.as_ref()) {
            Ok(queries) => queries,
            Err(e) => {
                error!("Cannot scan repository {}: {}", id, e);
                failed = true;
                continue;
            }
        };
        if verbosity != Verbosity::Quiet {
            info!("Generating cache for {} ({} queries)", id, queries.len());
        }

        for query in &queries {
            stats.queries += 1;
            match matcher.match_package(query, &options) {
                Ok(result) => {
                    if result.is_found() {
                        stats.matched += 1;
                    }
                    if verbosity == Verbosity::Verbose {
                        debug!("{} -> {}", query, result);
                    }
                }
                Err(e) => {
                    stats.errors += 1;
                    debug!("Skipping {}: {}", query, e);
                }
            }
        }
        stats.repositories += 1;
    }

    if !session.cache().sync(true) {
        warn!("Cache writer did not drain");
    }
    (!failed).then_some(stats)
}

/// Keys, bare names, atoms and dependency strings of one repository
fn repository_queries(store: &dyn RepositoryStore) -> Result<BTreeSet<String>> {
    let mut queries = BTreeSet::new();
    for key in store.list_keys()? {
        if let Some((_, name)) = key.split_once('/') {
            queries.insert(name.to_string());
        }
        queries.insert(key);
    }
    queries.extend(store.list_atoms()?);
    queries.extend(store.list_dependencies()?);
    Ok(queries)
}

/// Remove every cache entry
pub fn clean_cache(session: &Session, verbosity: Verbosity) -> i32 {
    match session.cache().clear_all() {
        Ok(()) => {
            if verbosity != Verbosity::Quiet {
                info!("Cache cleaned: {}", session.cache().dir().display());
            }
            0
        }
        Err(e) => {
            error!("Cannot clean cache {}: {}", session.cache().dir().display(), e);
            1
        }
    }
}
