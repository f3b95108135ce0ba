//! Requirements as the resolver sees them.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use ordo_core::requirement::RequirementSpec;
use ordo_core::specifier::SpecifierSet;

use crate::cache::ValueCache;
use crate::candidate::{Candidate, REQUIRES_PYTHON_IDENTIFIER};

/// A constraint on which candidate may be pinned for one identifier.
///
/// Cloning is cheap: every variant is reference counted.
#[derive(Debug, Clone)]
pub enum Requirement {
    /// Exactly this candidate and nothing else.
    Explicit(Rc<Candidate>),
    /// A project name with extras and a specifier set.
    Specifier(Rc<SpecifierRequirement>),
    /// The interpreter must fall inside a specifier set.
    RequiresPython(Rc<RequiresPythonRequirement>),
}

#[derive(Debug, PartialEq, Eq)]
pub struct SpecifierRequirement {
    name: String,
    project_name: String,
    extras: BTreeSet<String>,
    specifier: SpecifierSet,
}

impl SpecifierRequirement {
    pub fn from_spec(spec: &RequirementSpec) -> Self {
        Self {
            name: spec.identifier(),
            project_name: spec.project_name(),
            extras: spec.extras.clone(),
            specifier: spec.specifier.clone(),
        }
    }

    /// Identifier, extras included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn extras(&self) -> &BTreeSet<String> {
        &self.extras
    }

    pub fn specifier(&self) -> &SpecifierSet {
        &self.specifier
    }
}

#[derive(Debug)]
pub struct RequiresPythonRequirement {
    specifier: SpecifierSet,
    python: Rc<Candidate>,
}

impl RequiresPythonRequirement {
    pub fn specifier(&self) -> &SpecifierSet {
        &self.specifier
    }

    pub fn python(&self) -> &Rc<Candidate> {
        &self.python
    }
}

/// Shortcut used by the factory and the preference heuristic: either a
/// candidate the requirement already fixes, or the user-level requirement
/// to search for.
#[derive(Debug, Clone, Copy)]
pub struct CandidateLookup<'a> {
    pub candidate: Option<&'a Rc<Candidate>>,
    pub install_requirement: Option<&'a SpecifierRequirement>,
}

impl Requirement {
    pub fn from_spec(spec: &RequirementSpec) -> Self {
        Requirement::Specifier(Rc::new(SpecifierRequirement::from_spec(spec)))
    }

    pub fn requires_python(specifier: SpecifierSet, python: Rc<Candidate>) -> Self {
        Requirement::RequiresPython(Rc::new(RequiresPythonRequirement { specifier, python }))
    }

    /// Identifier of the project this requirement constrains.
    pub fn name(&self) -> &str {
        match self {
            Requirement::Explicit(candidate) => candidate.name(),
            Requirement::Specifier(req) => req.name(),
            Requirement::RequiresPython(_) => REQUIRES_PYTHON_IDENTIFIER,
        }
    }

    pub fn project_name(&self) -> &str {
        match self {
            Requirement::Explicit(candidate) => candidate.project_name(),
            Requirement::Specifier(req) => req.project_name(),
            Requirement::RequiresPython(_) => REQUIRES_PYTHON_IDENTIFIER,
        }
    }

    pub fn specifier(&self) -> Option<&SpecifierSet> {
        match self {
            Requirement::Explicit(_) => None,
            Requirement::Specifier(req) => Some(&req.specifier),
            Requirement::RequiresPython(req) => Some(&req.specifier),
        }
    }

    pub fn get_candidate_lookup(&self) -> CandidateLookup<'_> {
        match self {
            Requirement::Explicit(candidate) => CandidateLookup {
                candidate: Some(candidate),
                install_requirement: None,
            },
            Requirement::Specifier(req) => CandidateLookup {
                candidate: None,
                install_requirement: Some(req.as_ref()),
            },
            Requirement::RequiresPython(req) => {
                let satisfied = req.specifier.contains(req.python.version(), true);
                CandidateLookup {
                    candidate: satisfied.then_some(&req.python),
                    install_requirement: None,
                }
            }
        }
    }

    pub fn is_satisfied_by(&self, candidate: &Candidate, cache: &ValueCache) -> bool {
        match self {
            Requirement::Explicit(pinned) => **pinned == *candidate,
            Requirement::Specifier(req) => {
                candidate.name() == req.name
                    && cache.specifier_contains(&req.specifier, candidate.version(), true)
            }
            Requirement::RequiresPython(req) => {
                candidate.is_python()
                    && cache.specifier_contains(&req.specifier, candidate.version(), true)
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Explicit(candidate) => {
                write!(f, "{}=={}", candidate.name(), candidate.version())
            }
            Requirement::Specifier(req) => write!(f, "{}{}", req.name, req.specifier),
            Requirement::RequiresPython(req) => write!(f, "Python{}", req.specifier),
        }
    }
}
