// src/version.rs

//! Package version ordering
//!
//! Versions follow the Portage grammar:
//!
//! ```text
//! 1.2.3b_rc2_p1-r4
//! ^^^^^^              dotted numeric components, optional trailing letter
//!       ^^^^^^^       zero or more _alpha/_beta/_pre/_rc/_p suffixes
//!              ^^^    optional source-package-manager revision
//! ```
//!
//! On top of that, Entropy packages carry a build tag and an integer
//! entropy revision, combined in [`EntropyVersion`].

use crate::dep::{ParseError, ParseErrorKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Version suffix kind, ordered from oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuffixKind {
    Alpha,
    Beta,
    Pre,
    Rc,
    P,
}

impl SuffixKind {
    pub fn as_str(&self) -> &str {
        match self {
            SuffixKind::Alpha => "alpha",
            SuffixKind::Beta => "beta",
            SuffixKind::Pre => "pre",
            SuffixKind::Rc => "rc",
            SuffixKind::P => "p",
        }
    }

    // "pre" must be tried before "p"
    fn split_prefix(s: &str) -> Option<(SuffixKind, &str)> {
        const KINDS: [(&str, SuffixKind); 5] = [
            ("alpha", SuffixKind::Alpha),
            ("beta", SuffixKind::Beta),
            ("pre", SuffixKind::Pre),
            ("rc", SuffixKind::Rc),
            ("p", SuffixKind::P),
        ];
        KINDS
            .iter()
            .find_map(|(name, kind)| s.strip_prefix(name).map(|rest| (*kind, rest)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suffix {
    pub kind: SuffixKind,
    pub number: Option<String>,
}

impl Suffix {
    // A missing suffix compares like "_p0"
    const NONE: Suffix = Suffix {
        kind: SuffixKind::P,
        number: None,
    };

    fn cmp_suffix(&self, other: &Suffix) -> Ordering {
        self.kind.cmp(&other.kind).then_with(|| {
            let a = self.number.as_deref().unwrap_or("0");
            let b = other.number.as_deref().unwrap_or("0");
            cmp_numeric_str(a, b)
        })
    }
}

/// A parsed package version
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    components: Vec<String>,
    letter: Option<char>,
    suffixes: Vec<Suffix>,
    revision: Option<String>,
}

impl Version {
    /// Parse a version string such as `1.2.3_rc1-r2`
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        let bad = || ParseError::new(input, ParseErrorKind::BadVersion);

        let (main, revision) = split_spm_revision(input);
        let (body, suffix_part) = match main.find('_') {
            Some(idx) => (&main[..idx], Some(&main[idx + 1..])),
            None => (main, None),
        };

        let (numbers, letter) = match body.chars().last() {
            Some(c) if c.is_ascii_lowercase() => (&body[..body.len() - 1], Some(c)),
            _ => (body, None),
        };

        let components: Vec<String> = numbers.split('.').map(str::to_string).collect();
        if components
            .iter()
            .any(|c| c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(bad());
        }

        let mut suffixes = Vec::new();
        if let Some(part) = suffix_part {
            for raw in part.split('_') {
                let (kind, number) = SuffixKind::split_prefix(raw).ok_or_else(bad)?;
                if !number.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(bad());
                }
                suffixes.push(Suffix {
                    kind,
                    number: (!number.is_empty()).then(|| number.to_string()),
                });
            }
        }

        Ok(Self {
            raw: input.to_string(),
            components,
            letter,
            suffixes,
            revision: revision.map(str::to_string),
        })
    }

    /// Whether `input` is a syntactically valid version
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Source-package-manager revision number (`0` when absent)
    pub fn spm_revision(&self) -> &str {
        self.revision.as_deref().unwrap_or("0")
    }

    /// The version string without its `-rN` part
    pub fn without_revision(&self) -> &str {
        split_spm_revision(&self.raw).0
    }

    fn cmp_components(&self, other: &Self) -> Ordering {
        let first = cmp_numeric_str(&self.components[0], &other.components[0]);
        if first != Ordering::Equal {
            return first;
        }
        let len = self.components.len().max(other.components.len());
        for i in 1..len {
            let ord = match (self.components.get(i), other.components.get(i)) {
                (Some(a), Some(b)) if a.starts_with('0') || b.starts_with('0') => {
                    a.trim_end_matches('0').cmp(b.trim_end_matches('0'))
                }
                (Some(a), Some(b)) => cmp_numeric_str(a, b),
                // an implicit component sorts before an explicit one: 1.0 < 1.0.0
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.letter.cmp(&other.letter)
    }

    fn cmp_suffixes(&self, other: &Self) -> Ordering {
        let len = self.suffixes.len().max(other.suffixes.len());
        for i in 0..len {
            let a = self.suffixes.get(i).unwrap_or(&Suffix::NONE);
            let b = other.suffixes.get(i).unwrap_or(&Suffix::NONE);
            let ord = a.cmp_suffix(b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_components(other)
            .then_with(|| self.cmp_suffixes(other))
            .then_with(|| cmp_numeric_str(self.spm_revision(), other.spm_revision()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split `1.2.3-r4` into `("1.2.3", Some("4"))`
pub(crate) fn split_spm_revision(input: &str) -> (&str, Option<&str>) {
    if let Some(idx) = input.rfind("-r") {
        let digits = &input[idx + 2..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return (&input[..idx], Some(digits));
        }
    }
    (input, None)
}

/// Compare two digit strings numerically without overflowing
fn cmp_numeric_str(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two version strings
///
/// Returns `None` when either side is not a valid version.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    if a == b {
        return Some(Ordering::Equal);
    }
    let a = Version::parse(a).ok()?;
    let b = Version::parse(b).ok()?;
    Some(a.cmp(&b))
}

/// Sort version strings newest first; invalid versions sink to the end
pub fn newest_first(versions: &[&str]) -> Vec<String> {
    let mut parsed: Vec<(Option<Version>, &str)> = versions
        .iter()
        .map(|v| (Version::parse(v).ok(), *v))
        .collect();
    parsed.sort_by(|(a, a_raw), (b, b_raw)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a_raw.cmp(b_raw),
    });
    parsed.into_iter().map(|(_, raw)| raw.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagChunk {
    Text(String),
    Number(String),
}

impl Ord for TagChunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TagChunk::Number(a), TagChunk::Number(b)) => cmp_numeric_str(a, b),
            (TagChunk::Text(a), TagChunk::Text(b)) => a.cmp(b),
            (TagChunk::Number(_), TagChunk::Text(_)) => Ordering::Less,
            (TagChunk::Text(_), TagChunk::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for TagChunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Natural sort key: alternating text and number chunks, always starting
/// (and ending) with a possibly empty text chunk.
fn natural_key(tag: &str) -> Vec<TagChunk> {
    let mut chunks = Vec::new();
    let mut text = String::new();
    let mut number = String::new();
    for c in tag.trim().chars() {
        if c.is_ascii_digit() {
            if number.is_empty() {
                chunks.push(TagChunk::Text(std::mem::take(&mut text)));
            }
            number.push(c);
        } else {
            if !number.is_empty() {
                chunks.push(TagChunk::Number(std::mem::take(&mut number)));
            }
            text.extend(c.to_lowercase());
        }
    }
    if !number.is_empty() {
        chunks.push(TagChunk::Number(number));
    }
    chunks.push(TagChunk::Text(text));
    chunks
}

/// Compare two package tags using natural ordering
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

/// Sort package tags, oldest first
pub fn sort_tags(tags: &mut [String]) {
    tags.sort_by_cached_key(|t| natural_key(t));
}

/// Version, build tag and entropy revision of a package
///
/// Ordered by tag, then version, then entropy revision. The entropy
/// revision is only ever a final tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropyVersion {
    pub version: String,
    pub tag: String,
    pub revision: i64,
    #[serde(skip)]
    parsed: Option<Version>,
}

impl EntropyVersion {
    pub fn new(version: &str, tag: &str, revision: i64) -> std::result::Result<Self, ParseError> {
        let parsed = Version::parse(version)?;
        Ok(Self {
            version: version.to_string(),
            tag: tag.to_string(),
            revision,
            parsed: Some(parsed),
        })
    }

    fn parsed(&self) -> Option<Version> {
        self.parsed
            .clone()
            .or_else(|| Version::parse(&self.version).ok())
    }
}

impl Ord for EntropyVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_tags(&self.tag, &other.tag)
            .then_with(|| match (self.parsed(), other.parsed()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => self.version.cmp(&other.version),
            })
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for EntropyVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EntropyVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntropyVersion {}

/// Sort entropy versions newest first
pub fn sort_entropy_newest_first(versions: &mut [EntropyVersion]) {
    versions.sort_by(|a, b| b.cmp(a));
}
