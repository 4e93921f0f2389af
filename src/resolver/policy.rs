// src/resolver/policy.rs

//! Cross-repository arbitration

use super::filter::{Candidate, RepositoryCandidates};
use crate::config::SelectionKind;

/// Decides which repository's candidates win
///
/// `per_repository` is in repository priority order and each list is
/// already sorted best first.
pub trait SelectionPolicy {
    /// Stable name, part of every cache fingerprint
    fn name(&self) -> &str;

    /// All candidates, best first
    fn order<'a>(&self, per_repository: &'a [RepositoryCandidates]) -> Vec<&'a Candidate>;

    /// The single winner
    fn select<'a>(&self, per_repository: &'a [RepositoryCandidates]) -> Option<&'a Candidate> {
        self.order(per_repository).into_iter().next()
    }
}

/// The first repository in priority order with any candidate wins
///
/// Versions are never compared across repositories.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepositoryPriority;

impl SelectionPolicy for RepositoryPriority {
    fn name(&self) -> &str {
        "priority"
    }

    fn order<'a>(&self, per_repository: &'a [RepositoryCandidates]) -> Vec<&'a Candidate> {
        per_repository
            .iter()
            .flat_map(|repo| repo.candidates.iter())
            .collect()
    }

    fn select<'a>(&self, per_repository: &'a [RepositoryCandidates]) -> Option<&'a Candidate> {
        per_repository
            .iter()
            .find_map(|repo| repo.candidates.first())
    }
}

/// The newest candidate across every repository wins
///
/// Ties go to the repository with the higher priority.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewestVersion;

impl SelectionPolicy for NewestVersion {
    fn name(&self) -> &str {
        "newest"
    }

    fn order<'a>(&self, per_repository: &'a [RepositoryCandidates]) -> Vec<&'a Candidate> {
        let mut all: Vec<&Candidate> = per_repository
            .iter()
            .flat_map(|repo| repo.candidates.iter())
            .collect();
        // stable sort keeps priority order among equals
        all.sort_by(|a, b| b.cmp_newness(a));
        all
    }
}

/// Build the policy named by the settings
pub fn policy_for(kind: SelectionKind) -> Box<dyn SelectionPolicy> {
    match kind {
        SelectionKind::Priority => Box::new(RepositoryPriority),
        SelectionKind::Newest => Box::new(NewestVersion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(repository: &str, id: i64, version: &str) -> Candidate {
        serde_json::from_value(serde_json::json!({
            "repository": repository,
            "package_id": id,
            "version": version,
            "tag": null,
            "revision": 0,
            "branch": "5",
        }))
        .unwrap()
    }

    fn fixture() -> Vec<RepositoryCandidates> {
        vec![
            RepositoryCandidates {
                repository: "a".to_string(),
                candidates: vec![candidate("a", 1, "1.0")],
            },
            RepositoryCandidates {
                repository: "b".to_string(),
                candidates: vec![candidate("b", 7, "9.9"), candidate("b", 3, "2.0")],
            },
        ]
    }

    #[test]
    fn test_priority_dominates_version() {
        let repos = fixture();
        let winner = RepositoryPriority.select(&repos).unwrap();
        assert_eq!((winner.repository.as_str(), winner.package_id), ("a", 1));

        let order: Vec<i64> = RepositoryPriority
            .order(&repos)
            .iter()
            .map(|c| c.package_id)
            .collect();
        assert_eq!(order, vec![1, 7, 3]);
    }

    #[test]
    fn test_priority_skips_empty_repositories() {
        let mut repos = fixture();
        repos[0].candidates.clear();
        let winner = RepositoryPriority.select(&repos).unwrap();
        assert_eq!(winner.package_id, 7);
    }

    #[test]
    fn test_newest_version() {
        let repos = fixture();
        let winner = NewestVersion.select(&repos).unwrap();
        assert_eq!((winner.repository.as_str(), winner.package_id), ("b", 7));

        let order: Vec<&str> = NewestVersion
            .order(&repos)
            .iter()
            .map(|c| c.version.as_str())
            .collect();
        assert_eq!(order, vec!["9.9", "2.0", "1.0"]);
    }

    #[test]
    fn test_newest_version_tie_prefers_priority() {
        let repos = vec![
            RepositoryCandidates {
                repository: "a".to_string(),
                candidates: vec![candidate("a", 5, "1.0")],
            },
            RepositoryCandidates {
                repository: "b".to_string(),
                candidates: vec![candidate("b", 2, "1.0")],
            },
        ];
        assert_eq!(NewestVersion.select(&repos).unwrap().repository, "a");
    }

    #[test]
    fn test_empty() {
        assert!(RepositoryPriority.select(&[]).is_none());
        assert!(NewestVersion.select(&[]).is_none());
    }
}
