// src/resolver/filter.rs

//! Per-repository candidate filtering and ordering

use super::mask::PackageMasks;
use crate::db::models::PackageRecord;
use crate::dep::{Atom, Operator};
use crate::error::Result;
use crate::repository::RepositoryStore;
use crate::version::{Version, compare_tags};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// A package that survived every filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub repository: String,
    pub package_id: i64,
    pub version: String,
    pub tag: Option<String>,
    pub revision: i64,
    pub branch: String,
    #[serde(skip)]
    parsed: Option<Version>,
}

impl Candidate {
    fn from_record(repository: &str, record: &PackageRecord, parsed: Version) -> Option<Self> {
        Some(Self {
            repository: repository.to_string(),
            package_id: record.id?,
            version: record.version.clone(),
            tag: record.tag.clone(),
            revision: record.revision,
            branch: record.branch.clone(),
            parsed: Some(parsed),
        })
    }

    fn parsed_version(&self) -> Option<Version> {
        self.parsed.clone().or_else(|| Version::parse(&self.version).ok())
    }

    /// Compare version, then tag, then entropy revision
    pub fn cmp_newness(&self, other: &Self) -> Ordering {
        let version = match (self.parsed_version(), other.parsed_version()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.version.cmp(&other.version),
        };
        version
            .then_with(|| {
                compare_tags(
                    self.tag.as_deref().unwrap_or(""),
                    other.tag.as_deref().unwrap_or(""),
                )
            })
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

/// Candidates of one repository, best first
#[derive(Debug, Clone)]
pub struct RepositoryCandidates {
    pub repository: String,
    pub candidates: Vec<Candidate>,
}

/// Environment the filters run in
#[derive(Debug, Clone, Copy)]
pub(crate) struct FilterContext<'a> {
    /// Only records on this branch match; `None` disables the filter
    pub branch: Option<&'a str>,
    /// Let tagged packages match an atom without a tag
    pub tagged_fallback: bool,
    /// Hide packages masked by the settings; `None` disables masking
    pub masks: Option<&'a PackageMasks>,
}

/// Collect the candidates of `store` matching `atom` under `category`
pub(crate) fn candidates(
    store: &dyn RepositoryStore,
    atom: &Atom,
    category: &str,
    ctx: FilterContext<'_>,
) -> Result<Vec<Candidate>> {
    let wanted = match (&atom.version, atom.blocker) {
        (Some(version), false) => Some(Version::parse(version)?),
        _ => None,
    };

    let mut survivors = Vec::new();

    for id in store.search_by_key(category, &atom.name)? {
        let Some(record) = store.match_info(id)? else {
            continue;
        };

        if let Some(branch) = ctx.branch
            && record.branch != branch
        {
            continue;
        }
        if let Some(slot) = &atom.slot
            && &record.slot != slot
        {
            continue;
        }
        match (&atom.tag, &record.tag) {
            (Some(want), Some(have)) if want == have => {}
            (Some(_), _) => continue,
            (None, Some(_)) if !ctx.tagged_fallback => continue,
            _ => {}
        }
        if let Some(revision) = atom.revision
            && record.revision != revision
        {
            continue;
        }
        if !use_deps_satisfied(&atom.use_deps, &record.useflags) {
            continue;
        }

        let parsed = match Version::parse(&record.version) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping package {} in {}: {}", id, store.id(), e);
                continue;
            }
        };
        if let Some(wanted) = &wanted
            && !version_matches(atom, wanted, &parsed)
        {
            continue;
        }

        if let Some(masks) = ctx.masks
            && masks.is_masked(store.id(), &record, &parsed)
        {
            debug!("Package {} in {} is masked", id, store.id());
            continue;
        }

        if let Some(candidate) = Candidate::from_record(store.id(), &record, parsed) {
            survivors.push((record.slot, candidate));
        }
    }

    if atom.revision.is_none() {
        keep_latest_revisions(&mut survivors);
    }

    let (tagged, untagged): (Vec<Candidate>, Vec<Candidate>) = survivors
        .into_iter()
        .map(|(_, candidate)| candidate)
        .partition(|candidate| candidate.tag.is_some() && atom.tag.is_none());

    // tagged packages only stand in when nothing untagged survived
    let mut found = if untagged.is_empty() { tagged } else { untagged };
    sort_best_first(&mut found, ctx.branch);
    Ok(found)
}

/// Keep only the highest entropy revision of each slot, tag, version and
/// branch; superseded rebuilds never match unless pinned with `~N`
fn keep_latest_revisions(survivors: &mut Vec<(String, Candidate)>) {
    survivors.sort_by(|(slot_a, a), (slot_b, b)| {
        slot_a
            .cmp(slot_b)
            .then_with(|| a.tag.cmp(&b.tag))
            .then_with(|| a.version.cmp(&b.version))
            .then_with(|| a.branch.cmp(&b.branch))
            .then_with(|| b.revision.cmp(&a.revision))
            .then_with(|| a.package_id.cmp(&b.package_id))
    });
    survivors.dedup_by(|(slot_a, a), (slot_b, b)| {
        slot_a == slot_b && a.tag == b.tag && a.version == b.version && a.branch == b.branch
    });
}

/// Newest first; ties prefer the active branch, then the lowest id
pub(crate) fn sort_best_first(candidates: &mut [Candidate], branch: Option<&str>) {
    candidates.sort_by(|a, b| {
        b.cmp_newness(a)
            .then_with(|| cmp_branch(b, a, branch))
            .then_with(|| a.package_id.cmp(&b.package_id))
    });
}

fn cmp_branch(a: &Candidate, b: &Candidate, preferred: Option<&str>) -> Ordering {
    let a_pref = preferred.is_some_and(|p| a.branch == p);
    let b_pref = preferred.is_some_and(|p| b.branch == p);
    a_pref
        .cmp(&b_pref)
        .then_with(|| compare_tags(&a.branch, &b.branch))
}

/// Whether `have` satisfies the version constraint of `atom`
pub(crate) fn version_matches(atom: &Atom, wanted: &Version, have: &Version) -> bool {
    if atom.wildcard {
        return have.as_str().starts_with(wanted.as_str());
    }
    match atom.operator {
        Operator::None | Operator::Equal => have == wanted,
        Operator::Approximate => {
            Version::parse(have.without_revision()).ok()
                == Version::parse(wanted.without_revision()).ok()
        }
        Operator::Greater => have > wanted,
        Operator::GreaterOrEqual => have >= wanted,
        Operator::Less => have < wanted,
        Operator::LessOrEqual => have <= wanted,
    }
}

/// Check `[use]` requirements against the flags recorded for a package
///
/// `flag` needs the flag on, `-flag` needs it off. The `(+)` and `(-)`
/// suffixes give the state assumed when the package does not mention the
/// flag at all. Conditional requirements (`flag?`, `flag=`) depend on the
/// requiring package and always pass here.
pub(crate) fn use_deps_satisfied(requirements: &[String], useflags: &[String]) -> bool {
    let mut assumed: Vec<String> = Vec::new();
    let mut flags: HashSet<&str> = useflags.iter().map(String::as_str).collect();

    let mut enabled = Vec::new();
    let mut disabled = Vec::new();

    for req in requirements {
        let req = req.as_str();
        if req.ends_with('?') || req.ends_with('=') {
            continue;
        }
        let (body, default) = if let Some(body) = req.strip_suffix("(+)") {
            (body, Some(true))
        } else if let Some(body) = req.strip_suffix("(-)") {
            (body, Some(false))
        } else {
            (req, None)
        };

        match body.strip_prefix('-') {
            Some(flag) => {
                // unknown flags count as enabled with (+) and disabled otherwise
                if !flags.contains(flag) && default == Some(true) {
                    assumed.push(flag.to_string());
                }
                disabled.push(flag);
            }
            None => {
                let negated = format!("-{}", body);
                if default == Some(true) && !flags.contains(negated.as_str()) {
                    assumed.push(body.to_string());
                }
                enabled.push(body);
            }
        }
    }

    flags.extend(assumed.iter().map(String::as_str));
    enabled.iter().all(|flag| flags.contains(flag))
        && disabled.iter().all(|flag| !flags.contains(flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SqliteRepository;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_use_defaults() {
        let flags = strings(&["kernel_linux"]);

        for valid in [
            "doesntexistforsure(+)",
            "-doesntexistforsure(-)",
            "kernel_linux(+)",
            "kernel_linux(-)",
        ] {
            assert!(use_deps_satisfied(&strings(&[valid]), &flags), "{}", valid);
        }
        for invalid in [
            "doesntexistforsure(-)",
            "-kernel_linux(+)",
            "-doesntexistforsure(+)",
            "-kernel_linux(-)",
        ] {
            assert!(!use_deps_satisfied(&strings(&[invalid]), &flags), "{}", invalid);
        }
    }

    #[test]
    fn test_plain_use_requirements() {
        let flags = strings(&["ssl", "gtk"]);
        assert!(use_deps_satisfied(&strings(&["ssl", "gtk"]), &flags));
        assert!(use_deps_satisfied(&strings(&["ssl", "-qt4"]), &flags));
        assert!(!use_deps_satisfied(&strings(&["qt4"]), &flags));
        assert!(!use_deps_satisfied(&strings(&["-ssl"]), &flags));
        assert!(use_deps_satisfied(&strings(&["qt4?", "!gtk="]), &flags));
        assert!(use_deps_satisfied(&[], &flags));
    }

    #[test]
    fn test_version_operators() {
        let check = |atom: &str, have: &str| {
            let atom = Atom::parse(atom).unwrap();
            let wanted = Version::parse(atom.version.as_deref().unwrap()).unwrap();
            version_matches(&atom, &wanted, &Version::parse(have).unwrap())
        };

        assert!(check("app-foo/foo-1.0", "1.0"));
        assert!(!check("app-foo/foo-1.0", "1.0.1"));
        assert!(check("=app-foo/foo-1.0", "1.0-r0"));
        assert!(check(">=app-foo/foo-1.0", "1.0"));
        assert!(check(">=app-foo/foo-1.0", "10"));
        assert!(!check(">app-foo/foo-1.0", "1.0"));
        assert!(check("<app-foo/foo-1.0", "1.0_rc1"));
        assert!(check("<=app-foo/foo-1.0", "1.0"));
        assert!(check("~app-foo/foo-1.0", "1.0-r3"));
        assert!(!check("~app-foo/foo-1.0", "1.0.1"));
        assert!(check("=app-foo/foo-1.2*", "1.2.5"));
        assert!(!check("=app-foo/foo-1.2*", "1.3"));
    }

    fn repo_with(records: Vec<PackageRecord>) -> SqliteRepository {
        let mut repo = SqliteRepository::open_in_memory("main").unwrap();
        let mut records = records;
        repo.add_packages(&mut records).unwrap();
        repo
    }

    fn pkg(version: &str) -> PackageRecord {
        PackageRecord::new(
            "app-foo".to_string(),
            "foo".to_string(),
            version.to_string(),
            "5".to_string(),
        )
    }

    fn ctx(branch: Option<&str>) -> FilterContext<'_> {
        FilterContext {
            branch,
            tagged_fallback: false,
            masks: None,
        }
    }

    #[test]
    fn test_candidates_newest_first() {
        let repo = repo_with(vec![pkg("1.0"), pkg("1.2.3"), pkg("0.5")]);
        let atom = Atom::parse("app-foo/foo").unwrap();

        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        let versions: Vec<&str> = found.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(versions, vec!["1.2.3", "1.0", "0.5"]);
    }

    #[test]
    fn test_branch_and_slot_filters() {
        let mut other_branch = pkg("2.0");
        other_branch.branch = "4".to_string();
        let mut slotted = pkg("1.5");
        slotted.slot = "1".to_string();
        let repo = repo_with(vec![pkg("1.0"), other_branch, slotted]);

        let atom = Atom::parse("app-foo/foo").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].version, "1.5");

        // no branch filter, e.g. for installed packages
        let found = candidates(&repo, &atom, "app-foo", ctx(None)).unwrap();
        assert_eq!(found[0].version, "2.0");

        let atom = Atom::parse("app-foo/foo:0").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "1.0");
    }

    #[test]
    fn test_tag_filters() {
        let mut tagged = pkg("3.0");
        tagged.tag = Some("4.11.0-sabayon".to_string());
        let repo = repo_with(vec![pkg("1.0"), tagged]);

        let atom = Atom::parse("app-foo/foo").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].tag.is_none());

        let atom = Atom::parse("app-foo/foo#4.11.0-sabayon").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "3.0");

        // with fallback enabled untagged packages still win
        let atom = Atom::parse("app-foo/foo").unwrap();
        let fallback = FilterContext {
            branch: Some("5"),
            tagged_fallback: true,
            masks: None,
        };
        let found = candidates(&repo, &atom, "app-foo", fallback).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "1.0");
    }

    #[test]
    fn test_tagged_fallback_when_nothing_untagged() {
        let mut tagged = pkg("3.0");
        tagged.tag = Some("abc".to_string());
        let repo = repo_with(vec![tagged]);
        let atom = Atom::parse("app-foo/foo").unwrap();

        assert!(candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap().is_empty());

        let fallback = FilterContext {
            branch: Some("5"),
            tagged_fallback: true,
            masks: None,
        };
        assert_eq!(candidates(&repo, &atom, "app-foo", fallback).unwrap().len(), 1);
    }

    #[test]
    fn test_blocker_skips_version_filter() {
        let repo = repo_with(vec![pkg("1.0")]);
        let atom = Atom::parse("!>=app-foo/foo-2.0").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_entropy_revision_pin_and_tie_break() {
        let mut old = pkg("1.0");
        old.revision = 1;
        let mut new = pkg("1.0");
        new.revision = 2;
        new.slot = "1".to_string();
        let repo = repo_with(vec![old, new]);

        let atom = Atom::parse("app-foo/foo-1.0").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found[0].revision, 2);

        let atom = Atom::parse("app-foo/foo-1.0~1").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].revision, 1);
    }

    #[test]
    fn test_superseded_revisions_are_hidden() {
        let mut first = pkg("1.0");
        first.revision = 1;
        let mut rebuild = pkg("1.0");
        rebuild.revision = 2;
        let mut older = pkg("0.9");
        older.revision = 7;
        let repo = repo_with(vec![first, rebuild, older]);

        let atom = Atom::parse("app-foo/foo").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        let seen: Vec<(&str, i64)> = found.iter().map(|c| (c.version.as_str(), c.revision)).collect();
        assert_eq!(seen, vec![("1.0", 2), ("0.9", 7)]);

        // an explicit revision still reaches the older build
        let atom = Atom::parse("app-foo/foo-1.0~1").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].revision, 1);
    }

    #[test]
    fn test_masked_packages_are_hidden() {
        let repo = repo_with(vec![pkg("1.0"), pkg("2.0")]);
        let settings = crate::config::Settings {
            package_mask: vec![">=app-foo/foo-2".to_string()],
            ..crate::config::Settings::default()
        };
        let masks = PackageMasks::from_settings(&settings).unwrap();
        let masked = FilterContext {
            branch: Some("5"),
            tagged_fallback: false,
            masks: Some(&masks),
        };

        let atom = Atom::parse("app-foo/foo").unwrap();
        let found = candidates(&repo, &atom, "app-foo", masked).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "1.0");

        assert_eq!(candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap().len(), 2);
    }

    #[test]
    fn test_use_filter_applies() {
        let mut with_ssl = pkg("1.0");
        with_ssl.useflags = strings(&["ssl"]);
        let repo = repo_with(vec![with_ssl, pkg("2.0")]);

        let atom = Atom::parse("app-foo/foo[ssl]").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "1.0");
    }

    #[test]
    fn test_equal_versions_prefer_lowest_id() {
        let mut a = pkg("1.0");
        a.slot = "a".to_string();
        let mut b = pkg("1.0");
        b.slot = "b".to_string();
        let repo = repo_with(vec![a, b]);

        let atom = Atom::parse("app-foo/foo").unwrap();
        let found = candidates(&repo, &atom, "app-foo", ctx(Some("5"))).unwrap();
        assert!(found[0].package_id < found[1].package_id);
    }
}
