//! Resolution session cache for version and specifier computations.
//!
//! Every version string, project name and specifier containment check the
//! resolver sees is computed once per session. Inputs are immutable values,
//! so entries never go stale; the cache only grows until it is cleared or
//! dropped with its session.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::Hash;

use ordo_core::name;
use ordo_core::specifier::SpecifierSet;
use ordo_core::version::{self, ParsedVersion, Version};
use ordo_util::errors::OrdoError;

/// Hit/miss counters for a [`ValueCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoised parsing, canonicalisation, and specifier checks for one session.
#[derive(Debug, Default)]
pub struct ValueCache {
    versions: RefCell<HashMap<String, ParsedVersion>>,
    strict_versions: RefCell<HashMap<String, Option<Version>>>,
    names: RefCell<HashMap<String, String>>,
    canonical_versions: RefCell<HashMap<String, String>>,
    contains: RefCell<HashMap<(SpecifierSet, String, bool), bool>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse leniently; non-PEP 440 strings come back as legacy versions.
    pub fn parse_version(&self, text: &str) -> ParsedVersion {
        self.memo(&self.versions, text.to_string(), |s| ParsedVersion::parse(s))
    }

    /// Parse a PEP 440 version, rejecting legacy forms.
    pub fn parse_strict_version(&self, text: &str) -> Result<Version, OrdoError> {
        self.memo(&self.strict_versions, text.to_string(), |s| {
            Version::parse(s).ok()
        })
        .ok_or_else(|| OrdoError::InvalidVersion {
            version: text.to_string(),
        })
    }

    pub fn canonicalize_name(&self, text: &str) -> String {
        self.memo(&self.names, text.to_string(), |s| name::canonicalize_name(s))
    }

    pub fn canonicalize_version(&self, text: &str) -> String {
        self.memo(&self.canonical_versions, text.to_string(), |s| {
            version::canonicalize_version(s)
        })
    }

    /// Whether `version` falls inside `specifier`, honouring the
    /// pre-release allowance.
    pub fn specifier_contains(
        &self,
        specifier: &SpecifierSet,
        version: &Version,
        allow_prereleases: bool,
    ) -> bool {
        // Keyed on the rendered version: `===` compares text, so `1.0` and
        // `1.0.0` must not share an entry.
        let key = (specifier.clone(), version.to_string(), allow_prereleases);
        self.memo(&self.contains, key, |_| {
            specifier.contains(version, allow_prereleases)
        })
    }

    /// Drop every memoised entry and reset the counters.
    pub fn clear(&self) {
        self.versions.borrow_mut().clear();
        self.strict_versions.borrow_mut().clear();
        self.names.borrow_mut().clear();
        self.canonical_versions.borrow_mut().clear();
        self.contains.borrow_mut().clear();
        self.hits.set(0);
        self.misses.set(0);
    }

    /// Total number of memoised entries across all tables.
    pub fn len(&self) -> usize {
        self.versions.borrow().len()
            + self.strict_versions.borrow().len()
            + self.names.borrow().len()
            + self.canonical_versions.borrow().len()
            + self.contains.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }

    fn memo<K, V>(&self, table: &RefCell<HashMap<K, V>>, key: K, compute: impl FnOnce(&K) -> V) -> V
    where
        K: Eq + Hash,
        V: Clone,
    {
        if let Some(value) = table.borrow().get(&key) {
            self.hits.set(self.hits.get() + 1);
            return value.clone();
        }
        let value = compute(&key);
        self.misses.set(self.misses.get() + 1);
        tracing::trace!(entries = table.borrow().len() + 1, "value cache miss");
        table.borrow_mut().insert(key, value.clone());
        value
    }
}
