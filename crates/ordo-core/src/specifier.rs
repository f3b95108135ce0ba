//! PEP 440 version specifiers and specifier sets.

use std::fmt;
use std::str::FromStr;

use ordo_util::errors::OrdoError;

use crate::version::Version;

/// Comparison operator of a single specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Compatible,
    Equal,
    NotEqual,
    LessThanEqual,
    GreaterThanEqual,
    LessThan,
    GreaterThan,
    Arbitrary,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Compatible => "~=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThanEqual => ">=",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::Arbitrary => "===",
        }
    }

    /// `==` or `===`.
    pub fn is_pin(self) -> bool {
        matches!(self, Operator::Equal | Operator::Arbitrary)
    }

    /// `<` or `<=`.
    pub fn is_upper_bound(self) -> bool {
        matches!(self, Operator::LessThan | Operator::LessThanEqual)
    }

    /// Split a leading operator off `spec`, longest spelling first.
    fn split(spec: &str) -> Option<(Operator, &str)> {
        const TABLE: [(&str, Operator); 8] = [
            ("===", Operator::Arbitrary),
            ("~=", Operator::Compatible),
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            ("<=", Operator::LessThanEqual),
            (">=", Operator::GreaterThanEqual),
            ("<", Operator::LessThan),
            (">", Operator::GreaterThan),
        ];
        TABLE
            .iter()
            .find_map(|(text, op)| spec.strip_prefix(text).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a specifier after validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Target {
    Version(Version),
    /// `==1.2.*` / `!=1.2.*`: epoch and release prefix.
    Prefix(Version),
    /// `===anything`
    Text(String),
}

/// A single version specifier such as `>=1.0` or `==2.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specifier {
    operator: Operator,
    version: String,
    target: Target,
}

impl Specifier {
    pub fn parse(spec: &str) -> Result<Self, OrdoError> {
        let invalid = |reason: &str| OrdoError::InvalidSpecifier {
            specifier: spec.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = spec.trim();
        let (operator, rest) = Operator::split(trimmed).ok_or_else(|| invalid("unknown operator"))?;
        let version = rest.trim();
        if version.is_empty() {
            return Err(invalid("missing version"));
        }
        if version.contains(char::is_whitespace) {
            return Err(invalid("whitespace inside version"));
        }

        let target = match operator {
            Operator::Arbitrary => Target::Text(version.to_string()),
            Operator::Equal | Operator::NotEqual => match version.strip_suffix(".*") {
                Some(prefix) => {
                    let parsed = Version::parse(prefix).map_err(|_| invalid("invalid version"))?;
                    if parsed != parsed.base_version() || parsed.has_local() {
                        return Err(invalid("wildcard allowed only after a release segment"));
                    }
                    Target::Prefix(parsed)
                }
                None => Target::Version(
                    Version::parse(version).map_err(|_| invalid("invalid version"))?,
                ),
            },
            _ => {
                let parsed = Version::parse(version).map_err(|_| invalid("invalid version"))?;
                if parsed.has_local() {
                    return Err(invalid("local versions are not allowed here"));
                }
                if operator == Operator::Compatible && parsed.release().len() < 2 {
                    return Err(invalid("~= needs at least two release segments"));
                }
                Target::Version(parsed)
            }
        };

        Ok(Self {
            operator,
            version: version.to_string(),
            target,
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether this specifier explicitly names a pre-release.
    pub fn allows_prereleases(&self) -> bool {
        match (&self.operator, &self.target) {
            (
                Operator::Equal
                | Operator::GreaterThanEqual
                | Operator::LessThanEqual
                | Operator::Compatible,
                Target::Version(v),
            ) => v.is_prerelease(),
            (Operator::Equal, Target::Prefix(v)) => v.is_prerelease(),
            // Versions are stored normalised, so `===` sees the normalised text.
            (Operator::Arbitrary, Target::Text(text)) => {
                Version::parse(text).is_ok_and(|v| v.is_prerelease())
            }
            _ => false,
        }
    }

    pub fn contains(&self, candidate: &Version, prereleases: bool) -> bool {
        if candidate.is_prerelease() && !prereleases {
            return false;
        }
        match (&self.operator, &self.target) {
            (Operator::Arbitrary, Target::Text(text)) => {
                candidate.to_string().eq_ignore_ascii_case(text)
            }
            (Operator::Equal, target) => matches_equal(candidate, target),
            (Operator::NotEqual, target) => !matches_equal(candidate, target),
            (Operator::Compatible, Target::Version(spec)) => {
                let release = spec.release();
                let prefix = Version::from_release(&release[..release.len() - 1]);
                candidate.public() >= *spec && prefix_matches(candidate, spec.epoch(), &prefix)
            }
            (Operator::LessThanEqual, Target::Version(spec)) => candidate.public() <= *spec,
            (Operator::GreaterThanEqual, Target::Version(spec)) => candidate.public() >= *spec,
            (Operator::LessThan, Target::Version(spec)) => {
                if candidate >= spec {
                    return false;
                }
                // `<3.0` must not admit `3.0.dev1`.
                !(!spec.is_prerelease()
                    && candidate.is_prerelease()
                    && candidate.base_version() == spec.base_version())
            }
            (Operator::GreaterThan, Target::Version(spec)) => {
                if candidate <= spec {
                    return false;
                }
                let same_base = candidate.base_version() == spec.base_version();
                if !spec.is_postrelease() && candidate.is_postrelease() && same_base {
                    return false;
                }
                !(candidate.has_local() && same_base)
            }
            _ => false,
        }
    }
}

fn matches_equal(candidate: &Version, target: &Target) -> bool {
    match target {
        Target::Prefix(prefix) => prefix_matches(candidate, prefix.epoch(), prefix),
        Target::Version(spec) if spec.has_local() => candidate == spec,
        Target::Version(spec) => candidate.public() == *spec,
        Target::Text(_) => false,
    }
}

/// Release-prefix match with zero padding (`1.0` matches `==1.0.0.*`).
fn prefix_matches(candidate: &Version, epoch: u64, prefix: &Version) -> bool {
    if candidate.epoch() != epoch {
        return false;
    }
    let release = candidate.release();
    prefix
        .release()
        .iter()
        .enumerate()
        .all(|(i, want)| release.get(i).copied().unwrap_or(0) == *want)
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

impl FromStr for Specifier {
    type Err = OrdoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A comma-separated conjunction of specifiers. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SpecifierSet {
    specifiers: Vec<Specifier>,
}

impl SpecifierSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(spec: &str) -> Result<Self, OrdoError> {
        let mut specifiers = Vec::new();
        for part in spec.split(',') {
            if part.trim().is_empty() {
                if spec.trim().is_empty() {
                    continue;
                }
                return Err(OrdoError::InvalidSpecifier {
                    specifier: spec.to_string(),
                    reason: "empty clause".to_string(),
                });
            }
            let parsed = Specifier::parse(part)?;
            if !specifiers.contains(&parsed) {
                specifiers.push(parsed);
            }
        }
        Ok(Self { specifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.specifiers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.specifiers.iter()
    }

    /// Every operator appearing in the set, in order.
    pub fn operators(&self) -> impl Iterator<Item = Operator> + '_ {
        self.specifiers.iter().map(Specifier::operator)
    }

    pub fn allows_prereleases(&self) -> bool {
        self.specifiers.iter().any(Specifier::allows_prereleases)
    }

    pub fn contains(&self, candidate: &Version, prereleases: bool) -> bool {
        if candidate.is_prerelease() && !prereleases {
            return false;
        }
        self.specifiers
            .iter()
            .all(|s| s.contains(candidate, prereleases))
    }

    /// Conjunction of two sets.
    pub fn intersect(&self, other: &SpecifierSet) -> SpecifierSet {
        let mut specifiers = self.specifiers.clone();
        for spec in &other.specifiers {
            if !specifiers.contains(spec) {
                specifiers.push(spec.clone());
            }
        }
        SpecifierSet { specifiers }
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.specifiers.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for SpecifierSet {
    type Err = OrdoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'a> IntoIterator for &'a SpecifierSet {
    type Item = &'a Specifier;
    type IntoIter = std::slice::Iter<'a, Specifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.specifiers.iter()
    }
}
