use ordo_core::requirement::RequirementSpec;
use ordo_core::specifier::SpecifierSet;

use crate::cache::ValueCache;
use crate::candidate::Candidate;

/// User-supplied restriction on a project's versions that never causes the
/// project to be installed by itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    specifier: SpecifierSet,
}

impl Constraint {
    /// A constraint admitting every version.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(specifier: SpecifierSet) -> Self {
        Self { specifier }
    }

    pub fn from_spec(spec: &RequirementSpec) -> Self {
        Self::new(spec.specifier.clone())
    }

    pub fn specifier(&self) -> &SpecifierSet {
        &self.specifier
    }

    pub fn is_empty(&self) -> bool {
        self.specifier.is_empty()
    }

    /// Conjunction of both constraints.
    pub fn merge(&self, other: &Constraint) -> Constraint {
        Constraint::new(self.specifier.intersect(&other.specifier))
    }

    pub fn is_satisfied_by(&self, candidate: &Candidate, cache: &ValueCache) -> bool {
        self.specifier.is_empty()
            || cache.specifier_contains(&self.specifier, candidate.version(), true)
    }
}
