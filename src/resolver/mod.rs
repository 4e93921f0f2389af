// src/resolver/mod.rs

//! Atom matching across repositories
//!
//! The [`Matcher`] resolves a dependency string to `(package_id, repository)`
//! pairs. Per repository, candidates are filtered by branch, slot, tag,
//! entropy revision, use flags, version and the user's package masks, then
//! sorted newest first. A
//! [`SelectionPolicy`] arbitrates between repositories. Every result is
//! memoized in the session's object cache under a fingerprint of the query
//! and the revisions of the repositories it looked at.

mod filter;
mod mask;
mod policy;

pub use filter::{Candidate, RepositoryCandidates};
pub use mask::PackageMasks;
pub use policy::{NewestVersion, RepositoryPriority, SelectionPolicy, policy_for};

use crate::cache::Fingerprint;
use crate::dep::{Atom, split_or_dependency};
use crate::error::{Error, Result};
use crate::repository::{INSTALLED_REPOSITORY_ID, RepositoryStore};
use crate::session::Session;
use filter::FilterContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Cache namespace of match results
pub const MATCH_NAMESPACE: &str = "atom_match";

/// Which repositories a match looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    /// Every enabled repository, in priority order
    #[default]
    Available,
    /// The given repositories, in the given order
    Repositories(Vec<String>),
    /// The installed-packages database
    Installed,
}

impl Scope {
    fn label(&self) -> String {
        match self {
            Scope::Available => "available".to_string(),
            Scope::Repositories(ids) => format!("repositories:{}", ids.join(",")),
            Scope::Installed => INSTALLED_REPOSITORY_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub scope: Scope,
    /// Overrides `Settings::strict_keys` when set
    pub strict_keys: Option<bool>,
    /// Let tagged packages satisfy an atom without a tag
    pub tagged_fallback: bool,
    /// Read and write the object cache
    pub use_cache: bool,
    /// Hide packages covered by `package_mask`; never applies to the
    /// installed scope
    pub mask_filter: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            scope: Scope::Available,
            strict_keys: None,
            tagged_fallback: false,
            use_cache: true,
            mask_filter: true,
        }
    }
}

impl MatchOptions {
    pub fn installed() -> Self {
        Self {
            scope: Scope::Installed,
            ..Self::default()
        }
    }

    pub fn in_repositories(ids: &[&str]) -> Self {
        Self {
            scope: Scope::Repositories(ids.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }
}

/// A resolved package, or the not-found sentinel `(-1, 1)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchResult {
    pub package_id: i64,
    pub repository: Option<String>,
}

impl MatchResult {
    pub fn found(package_id: i64, repository: &str) -> Self {
        Self {
            package_id,
            repository: Some(repository.to_string()),
        }
    }

    pub fn not_found() -> Self {
        Self {
            package_id: -1,
            repository: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.package_id > 0 && self.repository.is_some()
    }

    /// 0 when found, 1 otherwise
    pub fn status(&self) -> i32 {
        if self.is_found() { 0 } else { 1 }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repository {
            Some(repo) if self.is_found() => write!(f, "({}, {})", self.package_id, repo),
            _ => write!(f, "(-1, 1)"),
        }
    }
}

pub struct Matcher<'s> {
    session: &'s Session,
}

struct OpenedStores {
    ids: Vec<String>,
    stores: Vec<Rc<dyn RepositoryStore>>,
    fingerprint: Fingerprint,
}

impl<'s> Matcher<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Best match for `dep`
    ///
    /// Returns the not-found sentinel when nothing matches. Malformed atoms
    /// and, in strict mode, ambiguous bare names are errors.
    pub fn match_package(&self, dep: &str, options: &MatchOptions) -> Result<MatchResult> {
        Ok(self
            .run(dep, options, false)?
            .into_iter()
            .next()
            .unwrap_or_else(MatchResult::not_found))
    }

    /// Every match for `dep`, best first
    pub fn match_packages(&self, dep: &str, options: &MatchOptions) -> Result<Vec<MatchResult>> {
        self.run(dep, options, true)
    }

    /// Best match for an already parsed atom
    pub fn match_atom(&self, atom: &Atom, options: &MatchOptions) -> Result<MatchResult> {
        Ok(self
            .resolve(atom, options, false)?
            .into_iter()
            .next()
            .unwrap_or_else(MatchResult::not_found))
    }

    fn run(&self, dep: &str, options: &MatchOptions, multi: bool) -> Result<Vec<MatchResult>> {
        if let Some(alternatives) = split_or_dependency(dep) {
            for alternative in alternatives {
                let found = self.run(alternative, options, multi)?;
                if !found.is_empty() {
                    return Ok(found);
                }
            }
            return Ok(Vec::new());
        }

        let atom = Atom::parse_lenient(dep.trim())?;
        self.resolve(&atom, options, multi)
    }

    fn resolve(&self, atom: &Atom, options: &MatchOptions, multi: bool) -> Result<Vec<MatchResult>> {
        let settings = self.session.settings();
        let strict = options.strict_keys.unwrap_or(settings.strict_keys)
            && atom.repositories.is_empty()
            && !matches!(options.scope, Scope::Repositories(_));
        let branch = match options.scope {
            Scope::Installed => None,
            _ => Some(settings.branch.as_str()),
        };
        let masks = (options.mask_filter && options.scope != Scope::Installed)
            .then(|| self.session.masks())
            .filter(|masks| !masks.is_empty());

        let opened = self.open_stores(atom, &options.scope);
        let key = format!(
            "{}/{}",
            MATCH_NAMESPACE,
            opened
                .fingerprint
                .clone()
                .field(atom)
                .field(multi)
                .field(options.scope.label())
                .field(strict)
                .field(options.tagged_fallback)
                .field(branch.unwrap_or(""))
                .field(self.session.policy().name())
                .field(masks.map_or("", |m| m.digest()))
                .finish()
        );

        let cache = self.session.cache();
        if options.use_cache
            && let Some(cached) = cache.pop::<Vec<MatchResult>>(&key)
        {
            if is_well_formed(&cached, &opened.ids, multi) {
                debug!("Match cache hit for {}", atom);
                return Ok(cached);
            }
            debug!("Discarding malformed cached match for {}", atom);
        }

        let ctx = FilterContext {
            branch,
            tagged_fallback: options.tagged_fallback,
            masks,
        };
        let results = self.compute(atom, &opened.stores, strict, ctx, multi)?;

        if options.use_cache
            && let Err(e) = cache.push(&key, results.clone(), true)
        {
            warn!("Cannot cache match for {}: {}", atom, e);
        }
        Ok(results)
    }

    /// Open the stores of the scope, skipping the ones that fail
    ///
    /// The returned fingerprint covers each repository id with its revision.
    fn open_stores(&self, atom: &Atom, scope: &Scope) -> OpenedStores {
        let mut ids = match scope {
            Scope::Available => self.session.repository_order(),
            Scope::Repositories(ids) => ids.clone(),
            Scope::Installed => vec![INSTALLED_REPOSITORY_ID.to_string()],
        };
        if !atom.repositories.is_empty() && *scope != Scope::Installed {
            ids.retain(|id| atom.repositories.contains(id));
        }

        let mut fingerprint = Fingerprint::new().field(MATCH_NAMESPACE);
        let mut stores = Vec::new();
        for id in &ids {
            let opened = self
                .session
                .store(id)
                .and_then(|store| store.revision().map(|revision| (store, revision)));
            match opened {
                Ok((store, revision)) => {
                    fingerprint = fingerprint.field(id).field(revision);
                    stores.push(store);
                }
                Err(e) => {
                    warn!("Skipping repository {}: {}", id, e);
                    fingerprint = fingerprint.field(id).field("unavailable");
                }
            }
        }

        OpenedStores {
            ids,
            stores,
            fingerprint,
        }
    }

    fn compute(
        &self,
        atom: &Atom,
        stores: &[Rc<dyn RepositoryStore>],
        strict: bool,
        ctx: FilterContext<'_>,
        multi: bool,
    ) -> Result<Vec<MatchResult>> {
        let category = match &atom.category {
            Some(category) => category.clone(),
            None => match resolve_category(&atom.name, stores, strict)? {
                Some(category) => category,
                None => return Ok(Vec::new()),
            },
        };

        let mut per_repository = Vec::with_capacity(stores.len());
        for store in stores {
            match filter::candidates(store.as_ref(), atom, &category, ctx) {
                Ok(candidates) => per_repository.push(RepositoryCandidates {
                    repository: store.id().to_string(),
                    candidates,
                }),
                Err(Error::Parse(e)) => return Err(Error::Parse(e)),
                Err(e) => warn!("Cannot query repository {}: {}", store.id(), e),
            }
        }

        let policy = self.session.policy();
        let to_result = |c: &Candidate| MatchResult::found(c.package_id, &c.repository);
        let results: Vec<MatchResult> = if multi {
            policy.order(&per_repository).into_iter().map(to_result).collect()
        } else {
            policy.select(&per_repository).map(to_result).into_iter().collect()
        };

        debug!(
            "Matched {} -> {}",
            atom,
            results
                .first()
                .map(ToString::to_string)
                .unwrap_or_else(|| MatchResult::not_found().to_string())
        );
        Ok(results)
    }

    /// Packages owning `path` in each repository of the scope
    pub fn belongs(&self, path: &str, scope: &Scope) -> Result<Vec<MatchResult>> {
        let symlinks = &self.session.settings().symlinks;
        self.collect(scope, |store| store.search_by_content_path(path, symlinks))
    }

    /// Packages providing `soname` for `arch` in each repository of the scope
    pub fn library_providers(&self, soname: &str, arch: &str, scope: &Scope) -> Result<Vec<MatchResult>> {
        self.collect(scope, |store| store.search_by_provided_library(soname, arch))
    }

    fn collect<F>(&self, scope: &Scope, query: F) -> Result<Vec<MatchResult>>
    where
        F: Fn(&dyn RepositoryStore) -> Result<Vec<i64>>,
    {
        let opened = self.open_stores(&Atom::default(), scope);
        let mut results = Vec::new();
        for store in &opened.stores {
            match query(store.as_ref()) {
                Ok(ids) => results.extend(ids.into_iter().map(|id| MatchResult::found(id, store.id()))),
                Err(e) => warn!("Cannot query repository {}: {}", store.id(), e),
            }
        }
        Ok(results)
    }
}

/// Map a bare package name to its category
///
/// Lenient mode takes the first repository knowing the name, and the first
/// key there. Strict mode fails when the name maps to several keys.
fn resolve_category(name: &str, stores: &[Rc<dyn RepositoryStore>], strict: bool) -> Result<Option<String>> {
    let mut all_keys = BTreeSet::new();

    for store in stores {
        let keys = match store.keys_for_name(name) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cannot list keys of {} in {}: {}", name, store.id(), e);
                continue;
            }
        };
        if strict {
            all_keys.extend(keys);
            continue;
        }
        if let Some(first) = keys.first() {
            if keys.len() > 1 {
                warn!(
                    "Package name {} is ambiguous in {} ({}), using {}",
                    name,
                    store.id(),
                    keys.join(", "),
                    first
                );
            }
            return Ok(category_of(first));
        }
    }

    match all_keys.len() {
        0 => Ok(None),
        1 => Ok(all_keys.first().and_then(|key| category_of(key))),
        _ => Err(Error::AmbiguousKey {
            name: name.to_string(),
            keys: all_keys.into_iter().collect(),
        }),
    }
}

fn category_of(key: &str) -> Option<String> {
    key.split_once('/').map(|(category, _)| category.to_string())
}

/// Structural check of a cached result before it is trusted
fn is_well_formed(results: &[MatchResult], scope_ids: &[String], multi: bool) -> bool {
    (multi || results.len() <= 1)
        && results.iter().all(|r| {
            r.is_found()
                && r.repository
                    .as_ref()
                    .is_some_and(|repo| scope_ids.iter().any(|id| id == repo))
        })
}
