//! Requirement strings: `name[extras] specifiers ; extra == "x"`.
//!
//! Only the subset of PEP 508 the index format needs is understood: a
//! project name, optional extras, an optional (possibly parenthesised)
//! specifier set, and an optional `extra == "..."` marker gating the
//! dependency behind one of the dependent's extras.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use ordo_util::errors::OrdoError;

use crate::name::{canonicalize_name, make_identifier};
use crate::specifier::SpecifierSet;

/// A parsed requirement string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequirementSpec {
    /// Project name as written.
    pub name: String,
    pub extras: BTreeSet<String>,
    pub specifier: SpecifierSet,
    /// Extra of the dependent that enables this requirement.
    pub marker_extra: Option<String>,
}

impl RequirementSpec {
    pub fn parse(text: &str) -> Result<Self, OrdoError> {
        let invalid = |reason: &str| OrdoError::InvalidRequirement {
            requirement: text.to_string(),
            reason: reason.to_string(),
        };

        let (body, marker) = match text.split_once(';') {
            Some((body, marker)) => (body, Some(marker)),
            None => (text, None),
        };
        let body = body.trim();

        let name_len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(body.len());
        let name = &body[..name_len];
        if name.is_empty() {
            return Err(invalid("missing project name"));
        }
        if !name.starts_with(|c: char| c.is_ascii_alphanumeric())
            || !name.ends_with(|c: char| c.is_ascii_alphanumeric())
        {
            return Err(invalid("project name must start and end with a letter or digit"));
        }

        let mut rest = body[name_len..].trim_start();
        let mut extras = BTreeSet::new();
        if let Some(after) = rest.strip_prefix('[') {
            let (inner, tail) = after
                .split_once(']')
                .ok_or_else(|| invalid("unterminated extras"))?;
            for extra in inner.split(',') {
                let extra = extra.trim();
                if extra.is_empty() {
                    continue;
                }
                extras.insert(canonicalize_name(extra));
            }
            rest = tail.trim_start();
        }

        let spec_text = match rest.strip_prefix('(') {
            Some(inner) => inner
                .strip_suffix(')')
                .ok_or_else(|| invalid("unbalanced parenthesis"))?,
            None => rest,
        };
        let specifier = SpecifierSet::parse(spec_text)?;

        let marker_extra = match marker {
            Some(marker) => Some(parse_extra_marker(marker).ok_or_else(|| {
                invalid("only `extra == \"name\"` markers are supported")
            })?),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            extras,
            specifier,
            marker_extra,
        })
    }

    /// Canonical project name.
    pub fn project_name(&self) -> String {
        canonicalize_name(&self.name)
    }

    /// Resolver identifier: canonical name plus sorted extras.
    pub fn identifier(&self) -> String {
        make_identifier(&self.project_name(), &self.extras)
    }
}

fn parse_extra_marker(marker: &str) -> Option<String> {
    let (lhs, rhs) = marker.split_once("==")?;
    if lhs.trim() != "extra" {
        return None;
    }
    let rhs = rhs.trim();
    let value = rhs
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| rhs.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))?;
    if value.is_empty() {
        return None;
    }
    Some(canonicalize_name(value))
}

impl fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        write!(f, "{}", self.specifier)?;
        if let Some(extra) = &self.marker_extra {
            write!(f, "; extra == \"{extra}\"")?;
        }
        Ok(())
    }
}

impl FromStr for RequirementSpec {
    type Err = OrdoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
