// src/dep.rs

//! Dependency string (atom) parsing
//!
//! An atom is laid out as:
//!
//! ```text
//! !>=app-foo/bar-1.2.3-r1:2[use,-other]#tag~1::repo1,repo2
//! ```
//!
//! Every part except `category/name` is optional. Parsing is a pure
//! function: no I/O, no repository access.

use crate::version::{Version, split_spm_revision};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between alternatives of an "or" dependency
pub const OR_DEP_SEPARATOR: char = ';';

/// Terminator marking a dependency string as an "or" dependency
pub const OR_DEP_MARKER: char = '?';

/// Extension of binary package files
pub const PACKAGE_EXTENSION: &str = ".tbz2";

/// Why a dependency string failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Empty,
    MissingCategory,
    InvalidKey,
    OperatorWithoutVersion,
    BadWildcard,
    BadVersion,
    BadSlot,
    BadUseDeps,
    BadTag,
    BadRevision,
    BadRepository,
    BadFilename,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ParseErrorKind::Empty => "empty dependency string",
            ParseErrorKind::MissingCategory => "missing category",
            ParseErrorKind::InvalidKey => "invalid category or package name",
            ParseErrorKind::OperatorWithoutVersion => "operator given without a version",
            ParseErrorKind::BadWildcard => "version wildcard requires the '=' operator",
            ParseErrorKind::BadVersion => "invalid version",
            ParseErrorKind::BadSlot => "invalid slot",
            ParseErrorKind::BadUseDeps => "malformed use flag section",
            ParseErrorKind::BadTag => "invalid package tag",
            ParseErrorKind::BadRevision => "invalid entropy revision",
            ParseErrorKind::BadRepository => "invalid repository pin",
            ParseErrorKind::BadFilename => "invalid package file name",
        }
    }
}

/// Malformed dependency string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid atom '{input}': {}", kind.as_str())]
pub struct ParseError {
    pub input: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(input: &str, kind: ParseErrorKind) -> Self {
        Self {
            input: input.to_string(),
            kind,
        }
    }
}

/// Version comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Operator {
    #[default]
    None,
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    /// Same version, any source-package-manager revision
    Approximate,
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::None => "",
            Operator::Equal => "=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Approximate => "~",
        }
    }

    /// Strip the longest leading operator from `s`
    fn split_prefix(s: &str) -> (Operator, &str) {
        const OPERATORS: [(&str, Operator); 6] = [
            (">=", Operator::GreaterOrEqual),
            ("<=", Operator::LessOrEqual),
            ("~", Operator::Approximate),
            (">", Operator::Greater),
            ("<", Operator::Less),
            ("=", Operator::Equal),
        ];
        for (prefix, op) in OPERATORS {
            if let Some(rest) = s.strip_prefix(prefix) {
                return (op, rest);
            }
        }
        (Operator::None, s)
    }
}

/// Parsed dependency specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Atom {
    /// `!` or `!!` prefix
    pub blocker: bool,
    pub operator: Operator,
    /// `None` only for bare-name lookups
    pub category: Option<String>,
    pub name: String,
    /// Version including any `-rN` revision
    pub version: Option<String>,
    /// Trailing `*` on the version
    pub wildcard: bool,
    pub slot: Option<String>,
    pub use_deps: Vec<String>,
    pub tag: Option<String>,
    /// Entropy revision (`~N`); `None` means latest
    pub revision: Option<i64>,
    /// Pinned repositories (`@repo` or `::repo`)
    pub repositories: Vec<String>,
}

impl Atom {
    /// Parse a fully qualified atom; a category is required
    pub fn parse(input: &str) -> std::result::Result<Self, ParseError> {
        parse_atom(input, false)
    }

    /// Parse an atom, allowing a bare package name without category
    pub fn parse_lenient(input: &str) -> std::result::Result<Self, ParseError> {
        parse_atom(input, true)
    }

    /// `category/name`, or just the name for bare atoms
    pub fn key(&self) -> String {
        match &self.category {
            Some(cat) => format!("{}/{}", cat, self.name),
            None => self.name.clone(),
        }
    }

    /// `category/name-version` with all operators and suffixes stripped
    pub fn cpv(&self) -> String {
        match &self.version {
            Some(ver) => format!("{}-{}", self.key(), ver),
            None => self.key(),
        }
    }

    pub fn is_just_name(&self) -> bool {
        self.version.is_none()
    }

    pub fn has_category(&self) -> bool {
        self.category.is_some()
    }

    /// Source-package-manager revision of the version (`r0` when absent)
    pub fn spm_revision(&self) -> String {
        let rev = self
            .version
            .as_deref()
            .and_then(|v| split_spm_revision(v).1)
            .unwrap_or("0");
        format!("r{}", rev)
    }

    /// Build an atom string from its parts (no operator, exact version)
    pub fn format(
        category: &str,
        name: &str,
        version: Option<&str>,
        slot: Option<&str>,
        tag: Option<&str>,
        revision: Option<i64>,
    ) -> String {
        Atom {
            category: Some(category.to_string()),
            name: name.to_string(),
            version: version.map(str::to_string),
            slot: slot.map(str::to_string),
            tag: tag.map(str::to_string),
            revision,
            ..Default::default()
        }
        .to_string()
    }
}

impl FromStr for Atom {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.blocker {
            f.write_str("!")?;
        }
        write!(f, "{}{}", self.operator.as_str(), self.cpv())?;
        if self.wildcard {
            f.write_str("*")?;
        }
        if let Some(slot) = &self.slot {
            write!(f, ":{}", slot)?;
        }
        if !self.use_deps.is_empty() {
            write!(f, "[{}]", self.use_deps.join(","))?;
        }
        if let Some(tag) = &self.tag {
            write!(f, "#{}", tag)?;
        }
        if let Some(rev) = self.revision {
            write!(f, "~{}", rev)?;
        }
        if !self.repositories.is_empty() {
            write!(f, "::{}", self.repositories.join(","))?;
        }
        Ok(())
    }
}

fn parse_atom(input: &str, allow_bare: bool) -> std::result::Result<Atom, ParseError> {
    let err = |kind| ParseError::new(input, kind);
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(err(ParseErrorKind::Empty));
    }

    let mut atom = Atom::default();

    if let Some(stripped) = rest.strip_prefix("!!").or_else(|| rest.strip_prefix('!')) {
        atom.blocker = true;
        rest = stripped;
    }

    let (operator, stripped) = Operator::split_prefix(rest);
    atom.operator = operator;
    rest = stripped;

    // repository pin
    let pin = rest
        .rfind("::")
        .map(|idx| (idx, 2))
        .or_else(|| rest.rfind('@').map(|idx| (idx, 1)));
    if let Some((idx, width)) = pin {
        let repos: Vec<String> = rest[idx + width..]
            .split(',')
            .map(str::to_string)
            .collect();
        if repos.iter().any(|r| r.is_empty() || r.contains(['@', ':', '/'])) {
            return Err(err(ParseErrorKind::BadRepository));
        }
        atom.repositories = repos;
        rest = &rest[..idx];
    }

    // entropy revision
    if let Some(idx) = rest.rfind('~') {
        let digits = &rest[idx + 1..];
        atom.revision = Some(digits.parse::<i64>().map_err(|_| err(ParseErrorKind::BadRevision))?);
        if atom.revision.is_some_and(|r| r < 0) {
            return Err(err(ParseErrorKind::BadRevision));
        }
        rest = &rest[..idx];
    }

    // package tag
    if let Some(idx) = rest.rfind('#') {
        let tag = &rest[idx + 1..];
        if !is_valid_package_tag(tag) || idx == 0 {
            return Err(err(ParseErrorKind::BadTag));
        }
        atom.tag = Some(tag.to_string());
        rest = &rest[..idx];
    }

    // use flags
    match (rest.find('['), rest.ends_with(']')) {
        (Some(open), true) => {
            let section = &rest[open + 1..rest.len() - 1];
            if section.contains(['[', ']']) {
                return Err(err(ParseErrorKind::BadUseDeps));
            }
            let flags: Vec<String> = section.split(',').map(str::to_string).collect();
            if flags.iter().any(|f| f.is_empty()) {
                return Err(err(ParseErrorKind::BadUseDeps));
            }
            atom.use_deps = flags;
            rest = &rest[..open];
        }
        (None, false) if !rest.contains(']') => {}
        _ => return Err(err(ParseErrorKind::BadUseDeps)),
    }

    // slot
    if let Some(idx) = rest.find(':') {
        let slot = &rest[idx + 1..];
        if slot.is_empty() || slot.contains(|c: char| c.is_whitespace() || c == ':') {
            return Err(err(ParseErrorKind::BadSlot));
        }
        atom.slot = Some(slot.to_string());
        rest = &rest[..idx];
    }

    if let Some(stripped) = rest.strip_suffix('*') {
        atom.wildcard = true;
        rest = stripped;
    }

    let pkg = match rest.split_once('/') {
        Some((cat, pkg)) => {
            if !is_valid_category(cat) {
                return Err(err(ParseErrorKind::InvalidKey));
            }
            atom.category = Some(cat.to_string());
            pkg
        }
        None if allow_bare => rest,
        None => return Err(err(ParseErrorKind::MissingCategory)),
    };

    let (name, version) = split_name_version(pkg).ok_or_else(|| err(ParseErrorKind::InvalidKey))?;
    atom.name = name.to_string();
    atom.version = version.map(str::to_string);

    match (&atom.version, atom.operator) {
        (None, op) if op != Operator::None => {
            return Err(err(ParseErrorKind::OperatorWithoutVersion));
        }
        _ => {}
    }
    if atom.wildcard
        && (atom.version.is_none() || !matches!(atom.operator, Operator::Equal | Operator::None))
    {
        return Err(err(ParseErrorKind::BadWildcard));
    }

    Ok(atom)
}

/// Split `name-1.2.3-r1` into name and version
///
/// The version starts at the last hyphen-separated component that is a
/// valid version, optionally followed by an `rN` component.
fn split_name_version(pkg: &str) -> Option<(&str, Option<&str>)> {
    let parts: Vec<&str> = pkg.split('-').collect();
    let n = parts.len();

    let version_start = if n >= 3 && is_spm_revision(parts[n - 1]) && Version::is_valid(parts[n - 2]) {
        Some(n - 2)
    } else if n >= 2 && Version::is_valid(parts[n - 1]) {
        Some(n - 1)
    } else {
        None
    };

    let (name, version) = match version_start {
        Some(start) => {
            let offset: usize = parts[..start].iter().map(|p| p.len() + 1).sum();
            (&pkg[..offset - 1], Some(&pkg[offset..]))
        }
        None => (pkg, None),
    };

    if !is_valid_name(name) {
        return None;
    }
    Some((name, version))
}

fn is_spm_revision(part: &str) -> bool {
    part.strip_prefix('r')
        .is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '+'
}

fn is_valid_category(cat: &str) -> bool {
    let mut chars = cat.chars();
    chars.next().is_some_and(is_key_char)
        && chars.all(|c| is_key_char(c) || c == '-' || c == '.')
}

// A package name must not end in a hyphen followed by a valid version.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let well_formed = chars.next().is_some_and(is_key_char)
        && chars.all(|c| is_key_char(c) || c == '-');
    if !well_formed {
        return false;
    }
    match name.rsplit_once('-') {
        Some((_, tail)) => !Version::is_valid(tail),
        None => true,
    }
}

/// Whether `tag` is a valid package tag
pub fn is_valid_package_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-'))
}

/// Split an "or" dependency (`a/b;c/d?`) into its alternatives
///
/// Returns `None` for plain dependency strings.
pub fn split_or_dependency(dep: &str) -> Option<Vec<&str>> {
    let body = dep.strip_suffix(OR_DEP_MARKER)?;
    Some(body.split(OR_DEP_SEPARATOR).filter(|s| !s.is_empty()).collect())
}

/// Components of a binary package file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFilename {
    pub category: String,
    pub name: String,
    pub version: String,
    pub tag: Option<String>,
    pub sha1: Option<String>,
    pub revision: Option<i64>,
}

/// Create a package file name: `cat:name-ver#tag.sha1~rev.tbz2`
pub fn create_package_filename(
    category: &str,
    name: &str,
    version: &str,
    tag: Option<&str>,
    sha1: Option<&str>,
    revision: Option<i64>,
) -> String {
    let mut filename = format!("{}:{}-{}", category, name, version);
    if let Some(tag) = tag.filter(|t| !t.is_empty()) {
        filename.push('#');
        filename.push_str(tag);
    }
    if let Some(sha1) = sha1 {
        filename.push('.');
        filename.push_str(sha1);
    }
    if let Some(rev) = revision {
        filename.push_str(&format!("~{}", rev));
    }
    filename.push_str(PACKAGE_EXTENSION);
    filename
}

/// Inverse of [`create_package_filename`]
pub fn exploit_package_filename(filename: &str) -> std::result::Result<PackageFilename, ParseError> {
    let err = || ParseError::new(filename, ParseErrorKind::BadFilename);

    let mut rest = filename.strip_suffix(PACKAGE_EXTENSION).unwrap_or(filename);

    let mut revision = None;
    if let Some(idx) = rest.rfind('~') {
        revision = Some(rest[idx + 1..].parse::<i64>().map_err(|_| err())?);
        rest = &rest[..idx];
    }

    let mut sha1 = None;
    if let Some(idx) = rest.rfind('.') {
        let candidate = &rest[idx + 1..];
        if candidate.len() == 40 && candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
            sha1 = Some(candidate.to_string());
            rest = &rest[..idx];
        }
    }

    let atom = Atom::parse(&rest.replacen(':', "/", 1)).map_err(|_| err())?;
    let (Some(category), Some(version)) = (atom.category, atom.version) else {
        return Err(err());
    };

    Ok(PackageFilename {
        category,
        name: atom.name,
        version,
        tag: atom.tag,
        sha1,
        revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_atom() {
        let atom = Atom::parse(">=app-foo/foo-1.2.3:2.3.4[ciao,come,va]").unwrap();
        assert_eq!(atom.operator, Operator::GreaterOrEqual);
        assert_eq!(atom.category.as_deref(), Some("app-foo"));
        assert_eq!(atom.name, "foo");
        assert_eq!(atom.version.as_deref(), Some("1.2.3"));
        assert_eq!(atom.slot.as_deref(), Some("2.3.4"));
        assert_eq!(atom.use_deps, ["ciao", "come", "va"]);
    }

    #[test]
    fn test_glossary_atom() {
        let atom = Atom::parse(">=app-foo/bar-1.2.3:2[use]#tag~1::repo").unwrap();
        assert_eq!(atom.key(), "app-foo/bar");
        assert_eq!(atom.slot.as_deref(), Some("2"));
        assert_eq!(atom.use_deps, ["use"]);
        assert_eq!(atom.tag.as_deref(), Some("tag"));
        assert_eq!(atom.revision, Some(1));
        assert_eq!(atom.repositories, ["repo"]);
    }

    #[test]
    fn test_is_just_name() {
        assert!(!Atom::parse("app-foo/foo-1.2.3").unwrap().is_just_name());
        assert!(Atom::parse("app-foo/foo").unwrap().is_just_name());
    }

    #[test]
    fn test_name_version_split() {
        let atom = Atom::parse("app-foo/foo-1.2.3").unwrap();
        assert_eq!((atom.name.as_str(), atom.version.as_deref()), ("foo", Some("1.2.3")));
        assert_eq!(atom.spm_revision(), "r0");

        let atom = Atom::parse("www-apps/389-foo-1.2.3").unwrap();
        assert_eq!((atom.name.as_str(), atom.version.as_deref()), ("389-foo", Some("1.2.3")));

        let atom = Atom::parse("app-foo/foo-1.2.3-r1").unwrap();
        assert_eq!(atom.version.as_deref(), Some("1.2.3-r1"));
        assert_eq!(atom.spm_revision(), "r1");

        let atom = Atom::parse("app-foo/foo-r1").unwrap();
        assert_eq!(atom.name, "foo-r1");
        assert!(atom.version.is_none());
    }

    #[test]
    fn test_cpv_and_key() {
        let atom = Atom::parse(">=app-foo/foo-1.2.3").unwrap();
        assert_eq!(atom.cpv(), "app-foo/foo-1.2.3");
        assert_eq!(atom.key(), "app-foo/foo");
    }

    #[test]
    fn test_tag_and_revision() {
        let atom = Atom::parse("app-foo/foo-1.2.3-r1#2.2.2-foo~1").unwrap();
        assert_eq!(atom.tag.as_deref(), Some("2.2.2-foo"));
        assert_eq!(atom.revision, Some(1));
        assert_eq!(atom.version.as_deref(), Some("1.2.3-r1"));
    }

    #[test]
    fn test_slot_with_revision() {
        let atom = Atom::parse(">=app-foo/foo-1.2.3:2.3.4~1").unwrap();
        assert_eq!(atom.slot.as_deref(), Some("2.3.4"));
        assert_eq!(atom.revision, Some(1));
        assert_eq!(atom.to_string(), ">=app-foo/foo-1.2.3:2.3.4~1");
    }

    #[test]
    fn test_repository_pin() {
        let atom = Atom::parse("app-foo/foo-1.2.3-r1@foorepo").unwrap();
        assert_eq!(atom.cpv(), "app-foo/foo-1.2.3-r1");
        assert_eq!(atom.repositories, ["foorepo"]);

        let atom = Atom::parse("app-foo/foo::one,two").unwrap();
        assert_eq!(atom.repositories, ["one", "two"]);

        assert!(Atom::parse("app-foo/foo@").is_err());
    }

    #[test]
    fn test_operators() {
        let cases = [
            ("=app-foo/foo-1", Operator::Equal),
            (">app-foo/foo-1", Operator::Greater),
            (">=app-foo/foo-1", Operator::GreaterOrEqual),
            ("<app-foo/foo-1", Operator::Less),
            ("<=app-foo/foo-1", Operator::LessOrEqual),
            ("~app-foo/foo-1", Operator::Approximate),
            ("app-foo/foo-1", Operator::None),
        ];
        for (input, op) in cases {
            assert_eq!(Atom::parse(input).unwrap().operator, op, "{}", input);
        }
    }

    #[test]
    fn test_blockers() {
        let atom = Atom::parse("!app-foo/foo").unwrap();
        assert!(atom.blocker);
        assert_eq!(atom.operator, Operator::None);

        let atom = Atom::parse("!!<app-foo/foo-2").unwrap();
        assert!(atom.blocker);
        assert_eq!(atom.operator, Operator::Less);
    }

    #[test]
    fn test_wildcard() {
        let atom = Atom::parse("=media-libs/test-1.2*").unwrap();
        assert!(atom.wildcard);
        assert_eq!(atom.version.as_deref(), Some("1.2"));
        assert_eq!(atom.to_string(), "=media-libs/test-1.2*");

        assert!(Atom::parse(">=media-libs/test-1.2*").is_err());
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("", ParseErrorKind::Empty),
            ("foo", ParseErrorKind::MissingCategory),
            (">=app-foo/foo", ParseErrorKind::OperatorWithoutVersion),
            ("app-foo/foo[]", ParseErrorKind::BadUseDeps),
            ("app-foo/foo[a,,b]", ParseErrorKind::BadUseDeps),
            ("app-foo/foo[a", ParseErrorKind::BadUseDeps),
            ("app-foo/foo#", ParseErrorKind::BadTag),
            ("app-foo/foo#hello,hello", ParseErrorKind::BadTag),
            ("app-foo/foo~x", ParseErrorKind::BadRevision),
            ("app-foo/foo:", ParseErrorKind::BadSlot),
            ("-app/foo", ParseErrorKind::InvalidKey),
            ("app-foo/", ParseErrorKind::InvalidKey),
        ];
        for (input, kind) in cases {
            let err = Atom::parse(input).unwrap_err();
            assert_eq!(err.kind, kind, "{}", input);
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn test_bare_names() {
        let atom = Atom::parse_lenient("foo").unwrap();
        assert!(!atom.has_category());
        assert_eq!(atom.key(), "foo");

        let atom = Atom::parse_lenient(">=foo-1.0").unwrap();
        assert_eq!(atom.name, "foo");
        assert_eq!(atom.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_format_round_trip() {
        let cases = [
            ("app-foo", "foo", Some("1.2.3"), None, None, None),
            ("app-foo", "foo", Some("1.2.3-r1"), Some("2"), Some("abc"), Some(4)),
            ("x11-misc", "lightdm-qt4", None, Some("0"), None, None),
            ("www-apps", "389-foo", Some("1.0_rc2"), None, Some("4.11.0-sabayon"), Some(0)),
        ];
        for (cat, name, ver, slot, tag, rev) in cases {
            let s = Atom::format(cat, name, ver, slot, tag, rev);
            let atom = Atom::parse(&s).unwrap();
            assert_eq!(atom.category.as_deref(), Some(cat));
            assert_eq!(atom.name, name);
            assert_eq!(atom.version.as_deref(), ver);
            assert_eq!(atom.slot.as_deref(), slot);
            assert_eq!(atom.tag.as_deref(), tag);
            assert_eq!(atom.revision, rev);
        }
    }

    #[test]
    fn test_valid_package_tag() {
        assert!(is_valid_package_tag("ciao"));
        for invalid in ["òpl", "hello,hello", "#hello", ""] {
            assert!(!is_valid_package_tag(invalid), "{}", invalid);
        }
    }

    #[test]
    fn test_split_or_dependency() {
        assert_eq!(
            split_or_dependency("app-foo/foo-1.2.3;app-foo/bar-1.4.3?"),
            Some(vec!["app-foo/foo-1.2.3", "app-foo/bar-1.4.3"])
        );
        assert_eq!(split_or_dependency("app-foo/foo"), None);
    }

    #[test]
    fn test_create_package_filename() {
        let sha1 = "c85320d9ddb90c13f4a215f1f0a87b531ab33310";
        let filename =
            create_package_filename("app-foo", "foo", "1.2.3", Some("abc"), Some(sha1), Some(123));
        assert_eq!(
            filename,
            "app-foo:foo-1.2.3#abc.c85320d9ddb90c13f4a215f1f0a87b531ab33310~123.tbz2"
        );

        let parts = exploit_package_filename(&filename).unwrap();
        assert_eq!(parts.category, "app-foo");
        assert_eq!(parts.name, "foo");
        assert_eq!(parts.version, "1.2.3");
        assert_eq!(parts.tag.as_deref(), Some("abc"));
        assert_eq!(parts.sha1.as_deref(), Some(sha1));
        assert_eq!(parts.revision, Some(123));
    }

    #[test]
    fn test_exploit_package_filename_sha1_only() {
        let parts = exploit_package_filename(
            "app-foo:bar-123.eda9a5004ce8eb127d939de6ec394571a407f863~1.tbz2",
        )
        .unwrap();
        assert_eq!(parts.sha1.as_deref(), Some("eda9a5004ce8eb127d939de6ec394571a407f863"));
        assert_eq!(parts.version, "123");
        assert!(parts.tag.is_none());

        assert!(exploit_package_filename("nonsense.tbz2").is_err());
    }
}
