//! PEP 440 version parsing, normalisation, and comparison.
//!
//! Versions are compared through a derived key that mirrors the PEP 440
//! ordering rules:
//! - Trailing zeros in the release segment are ignored (`1.0 == 1.0.0`)
//! - A dev release without a pre-release sorts before any pre-release
//! - Pre-releases sort before the final release, post-releases after it
//! - Local labels sort after the public version; numeric local segments
//!   sort after alphanumeric ones

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use ordo_util::errors::OrdoError;

/// Pre-release phase, in PEP 440 order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    Rc,
}

impl PreKind {
    fn as_str(self) -> &'static str {
        match self {
            PreKind::Alpha => "a",
            PreKind::Beta => "b",
            PreKind::Rc => "rc",
        }
    }
}

/// One dot-separated part of a local version label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalSegment {
    Number(u64),
    Text(String),
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalSegment::Number(n) => write!(f, "{n}"),
            LocalSegment::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed, normalised PEP 440 version.
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalSegment>,
}

impl Version {
    /// Build a plain release version such as `1.2.3`.
    pub fn from_release(release: impl Into<Vec<u64>>) -> Self {
        let release = release.into();
        Self {
            epoch: 0,
            release: if release.is_empty() { vec![0] } else { release },
            pre: None,
            post: None,
            dev: None,
            local: Vec::new(),
        }
    }

    pub fn parse(version: &str) -> Result<Self, OrdoError> {
        Parser::new(version).parse().ok_or_else(|| OrdoError::InvalidVersion {
            version: version.to_string(),
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<(PreKind, u64)> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn local(&self) -> &[LocalSegment] {
        &self.local
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    pub fn is_devrelease(&self) -> bool {
        self.dev.is_some()
    }

    pub fn has_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// The version without its local label.
    pub fn public(&self) -> Version {
        Version {
            local: Vec::new(),
            ..self.clone()
        }
    }

    /// Epoch and release only (`1!2.0rc1.post3` → `1!2.0`).
    pub fn base_version(&self) -> Version {
        Version {
            epoch: self.epoch,
            release: self.release.clone(),
            pre: None,
            post: None,
            dev: None,
            local: Vec::new(),
        }
    }

    /// Normalised text with trailing zero release segments removed.
    pub fn canonical(&self) -> String {
        let mut release = self.release.as_slice();
        while release.len() > 1 && release.last() == Some(&0) {
            release = &release[..release.len() - 1];
        }
        self.render(release)
    }

    fn render(&self, release: &[u64]) -> String {
        let mut out = String::new();
        if self.epoch != 0 {
            out.push_str(&format!("{}!", self.epoch));
        }
        let parts: Vec<String> = release.iter().map(u64::to_string).collect();
        out.push_str(&parts.join("."));
        if let Some((kind, n)) = self.pre {
            out.push_str(&format!("{}{n}", kind.as_str()));
        }
        if let Some(n) = self.post {
            out.push_str(&format!(".post{n}"));
        }
        if let Some(n) = self.dev {
            out.push_str(&format!(".dev{n}"));
        }
        if !self.local.is_empty() {
            let parts: Vec<String> = self.local.iter().map(ToString::to_string).collect();
            out.push('+');
            out.push_str(&parts.join("."));
        }
        out
    }

    fn key(&self) -> VersionKey {
        let mut release = self.release.clone();
        while release.last() == Some(&0) {
            release.pop();
        }
        let pre = match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (None, _, _) => PreKey::Final,
            (Some((kind, n)), _, _) => PreKey::Pre(kind, n),
        };
        let dev = match self.dev {
            Some(n) => DevKey::Dev(n),
            None => DevKey::Release,
        };
        let local = if self.local.is_empty() {
            None
        } else {
            Some(
                self.local
                    .iter()
                    .map(|seg| match seg {
                        LocalSegment::Number(n) => LocalKey::Number(*n),
                        LocalSegment::Text(s) => LocalKey::Text(s.clone()),
                    })
                    .collect(),
            )
        };
        VersionKey {
            epoch: self.epoch,
            release,
            pre,
            post: self.post,
            dev,
            local,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PreKey {
    DevOnly,
    Pre(PreKind, u64),
    Final,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum DevKey {
    Dev(u64),
    Release,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LocalKey {
    Text(String),
    Number(u64),
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct VersionKey {
    epoch: u64,
    release: Vec<u64>,
    pre: PreKey,
    post: Option<u64>,
    dev: DevKey,
    local: Option<Vec<LocalKey>>,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&self.release))
    }
}

impl FromStr for Version {
    type Err = OrdoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A version string that may not be PEP 440 compliant.
///
/// Legacy versions sort before every PEP 440 version and compare among
/// themselves by their text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParsedVersion {
    Pep440(Version),
    Legacy(String),
}

impl ParsedVersion {
    /// Parse leniently: anything that is not PEP 440 becomes `Legacy`.
    pub fn parse(version: &str) -> Self {
        match Version::parse(version) {
            Ok(v) => ParsedVersion::Pep440(v),
            Err(_) => ParsedVersion::Legacy(version.to_string()),
        }
    }

    pub fn as_pep440(&self) -> Option<&Version> {
        match self {
            ParsedVersion::Pep440(v) => Some(v),
            ParsedVersion::Legacy(_) => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, ParsedVersion::Legacy(_))
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ParsedVersion::Pep440(a), ParsedVersion::Pep440(b)) => a.cmp(b),
            (ParsedVersion::Legacy(a), ParsedVersion::Legacy(b)) => a.cmp(b),
            (ParsedVersion::Legacy(_), ParsedVersion::Pep440(_)) => Ordering::Less,
            (ParsedVersion::Pep440(_), ParsedVersion::Legacy(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedVersion::Pep440(v) => write!(f, "{v}"),
            ParsedVersion::Legacy(s) => f.write_str(s),
        }
    }
}

/// Hand-rolled cursor over the lower-cased version text.
struct Parser {
    text: Vec<u8>,
    pos: usize,
}

impl Parser {
    fn new(version: &str) -> Self {
        Self {
            text: version.trim().to_ascii_lowercase().into_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Option<Version> {
        self.eat(b"v");

        let mut epoch = 0;
        let start = self.pos;
        if let Some(n) = self.number() {
            if self.eat(b"!") {
                epoch = n;
            } else {
                self.pos = start;
            }
        }

        let mut release = vec![self.number()?];
        loop {
            let save = self.pos;
            if self.eat(b".") {
                if let Some(n) = self.number() {
                    release.push(n);
                    continue;
                }
            }
            self.pos = save;
            break;
        }

        let pre = self.pre_release();
        let post = self.post_release();
        let dev = self.dev_release();

        let local = if self.eat(b"+") {
            self.local_label()?
        } else {
            Vec::new()
        };

        if self.pos != self.text.len() {
            return None;
        }

        Some(Version {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    fn pre_release(&mut self) -> Option<(PreKind, u64)> {
        let save = self.pos;
        self.separator();
        let kind = if self.eat(b"alpha") || self.eat(b"a") {
            PreKind::Alpha
        } else if self.eat(b"beta") || self.eat(b"b") {
            PreKind::Beta
        } else if self.eat(b"preview") || self.eat(b"pre") || self.eat(b"rc") || self.eat(b"c")
        {
            PreKind::Rc
        } else {
            self.pos = save;
            return None;
        };
        Some((kind, self.implicit_number()))
    }

    fn post_release(&mut self) -> Option<u64> {
        let save = self.pos;
        if self.eat(b"-") {
            if let Some(n) = self.number() {
                return Some(n);
            }
            self.pos = save;
        }
        self.separator();
        if self.eat(b"post") || self.eat(b"rev") || self.eat(b"r") {
            return Some(self.implicit_number());
        }
        self.pos = save;
        None
    }

    fn dev_release(&mut self) -> Option<u64> {
        let save = self.pos;
        self.separator();
        if self.eat(b"dev") {
            return Some(self.implicit_number());
        }
        self.pos = save;
        None
    }

    fn local_label(&mut self) -> Option<Vec<LocalSegment>> {
        let mut segments = Vec::new();
        loop {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
                self.pos += 1;
            }
            if start == self.pos {
                return None;
            }
            let part = std::str::from_utf8(&self.text[start..self.pos]).ok()?;
            segments.push(match part.parse::<u64>() {
                Ok(n) if part.bytes().all(|c| c.is_ascii_digit()) => LocalSegment::Number(n),
                _ => LocalSegment::Text(part.to_string()),
            });
            if !self.separator() {
                return Some(segments);
            }
        }
    }

    /// Optional separator followed by an optional number (defaults to 0).
    fn implicit_number(&mut self) -> u64 {
        let save = self.pos;
        self.separator();
        match self.number() {
            Some(n) => n,
            None => {
                // Keep a dangling separator when it is the last character.
                if self.pos != self.text.len() {
                    self.pos = save;
                }
                0
            }
        }
    }

    fn separator(&mut self) -> bool {
        if matches!(self.peek(), Some(b'.' | b'-' | b'_')) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Option<u64> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        std::str::from_utf8(&self.text[start..self.pos]).ok()?.parse().ok()
    }

    fn eat(&mut self, token: &[u8]) -> bool {
        if self.text[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }
}

/// Normalise a version string with trailing zero release segments removed.
///
/// Strings that are not valid PEP 440 are returned unchanged.
pub fn canonicalize_version(version: &str) -> String {
    match Version::parse(version) {
        Ok(v) => v.canonical(),
        Err(_) => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn basic_ordering() {
        assert!(v("1.0") < v("2.0"));
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.0.1") < v("1.1.0"));
    }

    #[test]
    fn trailing_zeros_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
    }

    #[test]
    fn release_phase_ordering() {
        let ordered = [
            "1.0.dev1",
            "1.0a1.dev1",
            "1.0a1",
            "1.0b2",
            "1.0rc1",
            "1.0",
            "1.0+local",
            "1.0.post1.dev0",
            "1.0.post1",
            "1.1.dev0",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn epoch_dominates() {
        assert!(v("1!0.1") > v("2000.0"));
    }

    #[test]
    fn alternate_spellings_normalise() {
        assert_eq!(v("1.0alpha1").to_string(), "1.0a1");
        assert_eq!(v("1.0-beta.2").to_string(), "1.0b2");
        assert_eq!(v("1.0c1").to_string(), "1.0rc1");
        assert_eq!(v("1.0.preview3").to_string(), "1.0rc3");
        assert_eq!(v("1.0-1").to_string(), "1.0.post1");
        assert_eq!(v("1.0rev").to_string(), "1.0.post0");
        assert_eq!(v("1.0-dev").to_string(), "1.0.dev0");
        assert_eq!(v("v2.1").to_string(), "2.1");
        assert_eq!(v(" 1.0A1 ").to_string(), "1.0a1");
        assert_eq!(v("1.0+Ubuntu-1").to_string(), "1.0+ubuntu.1");
    }

    #[test]
    fn local_segments_order() {
        assert!(v("1.0+abc") < v("1.0+1"));
        assert!(v("1.0+1") < v("1.0+1.0"));
        assert!(v("1.0+2") < v("1.0+10"));
    }

    #[test]
    fn invalid_versions_rejected() {
        for bad in ["", "abc", "1.0.", "1..0", "1.0+", "1.0 beta", "1.0-+x", "2!"] {
            assert!(Version::parse(bad).is_err(), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn flags() {
        assert!(v("1.0rc1").is_prerelease());
        assert!(v("1.0.dev3").is_prerelease());
        assert!(v("1.0.post1").is_postrelease());
        assert!(!v("1.0").is_prerelease());
        assert!(v("1.0+x").has_local());
        assert_eq!(v("1!2.0rc1.post3+x").base_version().to_string(), "1!2.0");
        assert_eq!(v("1.0+x").public().to_string(), "1.0");
    }

    #[test]
    fn canonical_strips_trailing_zeros() {
        assert_eq!(canonicalize_version("1.0.0"), "1");
        assert_eq!(canonicalize_version("1.2.0rc1"), "1.2rc1");
        assert_eq!(canonicalize_version("0.0"), "0");
        assert_eq!(canonicalize_version("not a version"), "not a version");
    }

    #[test]
    fn legacy_sorts_first() {
        let legacy = ParsedVersion::parse("french toast");
        let modern = ParsedVersion::parse("0.0.1");
        assert!(legacy.is_legacy());
        assert!(legacy < modern);
        assert_eq!(modern.as_pep440(), Some(&v("0.0.1")));
    }

    #[test]
    fn hash_consistent_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(v("1.0"));
        assert!(set.contains(&v("1.0.0")));
    }
}
