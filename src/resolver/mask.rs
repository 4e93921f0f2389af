// src/resolver/mask.rs

//! User package masking
//!
//! `package_mask` atoms hide matching packages from the matcher;
//! `package_unmask` atoms win over them. Both lists come from the settings.

use super::filter::{use_deps_satisfied, version_matches};
use crate::cache::Fingerprint;
use crate::config::Settings;
use crate::db::models::PackageRecord;
use crate::dep::Atom;
use crate::error::{Error, Result};
use crate::version::Version;

#[derive(Debug, Clone, Default)]
pub struct PackageMasks {
    mask: Vec<Atom>,
    unmask: Vec<Atom>,
    digest: String,
}

impl PackageMasks {
    /// Parse the mask and unmask lists of `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mask = parse_list("package_mask", &settings.package_mask)?;
        let unmask = parse_list("package_unmask", &settings.package_unmask)?;

        let mut fingerprint = Fingerprint::new().field("package_mask");
        for atom in &mask {
            fingerprint = fingerprint.field(atom);
        }
        fingerprint = fingerprint.field("package_unmask");
        for atom in &unmask {
            fingerprint = fingerprint.field(atom);
        }

        Ok(Self {
            mask,
            unmask,
            digest: fingerprint.finish(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Digest of both lists, part of every masked match fingerprint
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Whether `record` of `repository` is masked and not unmasked
    pub(crate) fn is_masked(&self, repository: &str, record: &PackageRecord, version: &Version) -> bool {
        self.mask
            .iter()
            .any(|atom| matches_record(atom, repository, record, version))
            && !self
                .unmask
                .iter()
                .any(|atom| matches_record(atom, repository, record, version))
    }
}

fn parse_list(field: &str, entries: &[String]) -> Result<Vec<Atom>> {
    entries
        .iter()
        .map(|entry| {
            Atom::parse_lenient(entry)
                .map_err(|e| Error::Config(format!("Invalid {} entry: {}", field, e)))
        })
        .collect()
}

/// Whether a mask atom covers a stored package
///
/// Bare names match any category. Pins restrict the atom to the named
/// repositories.
fn matches_record(atom: &Atom, repository: &str, record: &PackageRecord, version: &Version) -> bool {
    if atom.name != record.name
        || atom.category.as_ref().is_some_and(|c| *c != record.category)
    {
        return false;
    }
    if !atom.repositories.is_empty() && !atom.repositories.iter().any(|r| r == repository) {
        return false;
    }
    if atom.slot.as_ref().is_some_and(|slot| *slot != record.slot)
        || atom.tag.as_ref().is_some_and(|tag| record.tag.as_ref() != Some(tag))
        || atom.revision.is_some_and(|rev| rev != record.revision)
    {
        return false;
    }
    if !use_deps_satisfied(&atom.use_deps, &record.useflags) {
        return false;
    }
    match atom.version.as_deref().map(Version::parse) {
        None => true,
        Some(Ok(wanted)) => version_matches(atom, &wanted, version),
        Some(Err(_)) => false,
    }
}
