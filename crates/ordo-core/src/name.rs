//! Project name normalisation and resolver identifiers.
//!
//! An identifier is a canonical project name, optionally followed by a
//! bracketed, comma-separated extras list: `requests[socks,security]`.

use std::collections::BTreeSet;

/// Normalise a project name (PEP 503): lower-case, runs of `-`, `_` and `.`
/// collapse to a single `-`.
pub fn canonicalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
                in_separator = true;
            }
        } else {
            out.push(ch.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

/// Split an identifier into its base name and the raw extras text.
///
/// Only the first `[` is significant; anything malformed after it is
/// returned as-is so callers can fall back to a base-name lookup.
pub fn split_extras(identifier: &str) -> (&str, Option<&str>) {
    match identifier.split_once('[') {
        Some((name, rest)) => (name, Some(rest.strip_suffix(']').unwrap_or(rest))),
        None => (identifier, None),
    }
}

/// Base name of an identifier with any extras suffix removed.
pub fn strip_extras(identifier: &str) -> &str {
    split_extras(identifier).0
}

/// Parsed, canonicalised extras of an identifier.
pub fn identifier_extras(identifier: &str) -> BTreeSet<String> {
    match split_extras(identifier).1 {
        Some(raw) => raw
            .split(',')
            .map(canonicalize_name)
            .filter(|e| !e.is_empty())
            .collect(),
        None => BTreeSet::new(),
    }
}

/// Build an identifier from a canonical name and its extras.
pub fn make_identifier<'a>(name: &str, extras: impl IntoIterator<Item = &'a String>) -> String {
    let extras: BTreeSet<&String> = extras.into_iter().collect();
    if extras.is_empty() {
        return name.to_string();
    }
    let joined: Vec<&str> = extras.iter().map(|e| e.as_str()).collect();
    format!("{name}[{}]", joined.join(","))
}
