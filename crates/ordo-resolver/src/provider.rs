//! Resolution provider: naming, search order, candidate lookup and backjump
//! widening for the solver.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use ordo_core::config::UpgradeStrategy;
use ordo_core::name::split_extras;
use ordo_core::specifier::Operator;

use crate::cache::ValueCache;
use crate::candidate::{Candidate, REQUIRES_PYTHON_IDENTIFIER};
use crate::constraint::Constraint;
use crate::factory::{CandidateMap, Factory, RequirementMap};
use crate::requirement::Requirement;
use crate::solver::{Provider, RequirementInformation, RequirementOrCandidate};

pub type Identifier = String;

/// A requirement plus the candidate that introduced it.
pub type PreferenceInformation = RequirementInformation<Requirement, Rc<Candidate>>;

/// A requirement involved in the conflict that triggered backtracking.
pub type BacktrackCause = PreferenceInformation;

/// A natural number or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ordinal {
    Finite(usize),
    Infinite,
}

impl Ordinal {
    fn succ(self) -> Self {
        match self {
            Ordinal::Finite(n) => Ordinal::Finite(n + 1),
            Ordinal::Infinite => Ordinal::Infinite,
        }
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ordinal::Finite(n) => write!(f, "{n}"),
            Ordinal::Infinite => f.write_str("inf"),
        }
    }
}

/// Best-known depth of each identifier in the dependency graph. Unknown
/// identifiers are infinitely deep.
#[derive(Debug, Clone, Default)]
pub struct KnownDepths {
    depths: HashMap<Identifier, Ordinal>,
}

impl KnownDepths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Ordinal {
        self.depths
            .get(identifier)
            .copied()
            .unwrap_or(Ordinal::Infinite)
    }

    pub fn insert(&mut self, identifier: impl Into<Identifier>, depth: Ordinal) {
        self.depths.insert(identifier.into(), depth);
    }

    pub fn clear(&mut self) {
        self.depths.clear();
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

/// Sort key for an unsatisfied identifier. Smaller keys are resolved first;
/// each boolean is stored negated so that `false` (the preferred case)
/// sorts first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Preference {
    pub not_requires_python: bool,
    pub not_direct: bool,
    pub not_pinned: bool,
    pub not_backtrack_cause: bool,
    pub inferred_depth: Ordinal,
    pub requested_order: Ordinal,
    pub not_unfree: bool,
    pub identifier: Identifier,
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {}, {}, {}, {})",
            self.not_requires_python,
            self.not_direct,
            self.not_pinned,
            self.not_backtrack_cause,
            self.inferred_depth,
            self.requested_order,
            self.not_unfree,
            self.identifier
        )
    }
}

/// Session-level knobs for [`ResolutionProvider`].
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// Constraints keyed by canonical project name or identifier.
    pub constraints: HashMap<String, Constraint>,
    pub ignore_dependencies: bool,
    pub upgrade_strategy: UpgradeStrategy,
    /// Position of each user-requested project among the root requirements.
    pub user_requested: HashMap<String, usize>,
}

pub struct ResolutionProvider<F> {
    factory: F,
    constraints: HashMap<String, Constraint>,
    ignore_dependencies: bool,
    upgrade_strategy: UpgradeStrategy,
    user_requested: HashMap<String, usize>,
    known_depths: KnownDepths,
    cache: Rc<ValueCache>,
}

impl<F: Factory> ResolutionProvider<F> {
    /// Takes ownership of `known_depths`; hand in a fresh table per session
    /// or one recovered with [`Self::into_known_depths`].
    pub fn new(
        factory: F,
        options: ProviderOptions,
        known_depths: KnownDepths,
        cache: Rc<ValueCache>,
    ) -> Self {
        Self {
            factory,
            constraints: options.constraints,
            ignore_dependencies: options.ignore_dependencies,
            upgrade_strategy: options.upgrade_strategy,
            user_requested: options.user_requested,
            known_depths,
            cache,
        }
    }

    pub fn known_depths(&self) -> &KnownDepths {
        &self.known_depths
    }

    pub fn reset_known_depths(&mut self) {
        self.known_depths.clear();
    }

    pub fn into_known_depths(self) -> KnownDepths {
        self.known_depths
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Whether any cause's requirement or parent names `identifier`.
    pub fn is_backtrack_cause(identifier: &str, backtrack_causes: &[BacktrackCause]) -> bool {
        backtrack_causes.iter().any(|cause| {
            cause.requirement.name() == identifier
                || cause
                    .parent
                    .as_ref()
                    .is_some_and(|parent| parent.name() == identifier)
        })
    }

    /// Whether installed candidates may be passed over for newer ones.
    pub fn eligible_for_upgrade(&self, identifier: &str) -> bool {
        match self.upgrade_strategy {
            UpgradeStrategy::Eager => true,
            UpgradeStrategy::OnlyIfNeeded => {
                let (name, _) = split_extras(identifier);
                self.user_requested.contains_key(name)
            }
            UpgradeStrategy::ToSatisfyOnly => false,
        }
    }

    fn inferred_depth(&self, identifier: &str, information: &[PreferenceInformation]) -> Ordinal {
        if self.user_requested.contains_key(identifier) {
            return Ordinal::Finite(1);
        }
        if information.is_empty() {
            return Ordinal::Infinite;
        }
        information
            .iter()
            .map(|info| match &info.parent {
                Some(parent) => self.known_depths.get(parent.name()),
                None => Ordinal::Finite(0),
            })
            .min()
            .unwrap_or(Ordinal::Infinite)
            .succ()
    }
}

/// Look up `identifier`, falling back to its base name when it carries
/// extras.
fn get_with_identifier<'m, V>(mapping: &'m HashMap<String, V>, identifier: &str) -> Option<&'m V> {
    if let Some(value) = mapping.get(identifier) {
        return Some(value);
    }
    match split_extras(identifier) {
        (name, Some(_)) => mapping.get(name),
        (_, None) => None,
    }
}

impl<F: Factory> Provider for ResolutionProvider<F> {
    type Identifier = Identifier;
    type Requirement = Requirement;
    type Candidate = Rc<Candidate>;
    type Preference = Preference;

    fn identify(&self, item: RequirementOrCandidate<'_, Requirement, Rc<Candidate>>) -> Identifier {
        match item {
            RequirementOrCandidate::Requirement(requirement) => requirement.name().to_string(),
            RequirementOrCandidate::Candidate(candidate) => candidate.name().to_string(),
        }
    }

    fn get_preference(
        &mut self,
        identifier: &Identifier,
        _resolutions: &HashMap<Identifier, Rc<Candidate>>,
        _candidates: &HashMap<Identifier, Vec<Rc<Candidate>>>,
        information: &HashMap<Identifier, Vec<PreferenceInformation>>,
        backtrack_causes: &[BacktrackCause],
    ) -> Preference {
        let infos = information
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut direct = false;
        let mut operators: Vec<Operator> = Vec::new();
        for info in infos {
            let lookup = info.requirement.get_candidate_lookup();
            direct |= lookup.candidate.is_some();
            if let Some(ireq) = lookup.install_requirement {
                operators.extend(ireq.specifier().operators());
            }
        }
        let pinned = operators.iter().any(|op| op.is_pin());
        let unfree = !operators.is_empty();

        let requested_order = match self.user_requested.get(identifier.as_str()) {
            Some(&order) => Ordinal::Finite(order),
            None => Ordinal::Infinite,
        };
        let inferred_depth = self.inferred_depth(identifier, infos);
        self.known_depths.insert(identifier.clone(), inferred_depth);

        let preference = Preference {
            not_requires_python: identifier != REQUIRES_PYTHON_IDENTIFIER,
            not_direct: !direct,
            not_pinned: !pinned,
            not_backtrack_cause: !Self::is_backtrack_cause(identifier, backtrack_causes),
            inferred_depth,
            requested_order,
            not_unfree: !unfree,
            identifier: identifier.clone(),
        };
        trace!(%preference, "preference");
        preference
    }

    fn find_matches(
        &self,
        identifier: &Identifier,
        requirements: &RequirementMap,
        incompatibilities: &CandidateMap,
    ) -> Vec<Rc<Candidate>> {
        let empty = Constraint::empty();
        let constraint = get_with_identifier(&self.constraints, identifier).unwrap_or(&empty);
        let prefers_installed = !self.eligible_for_upgrade(identifier);
        self.factory.find_candidates(
            identifier,
            requirements,
            constraint,
            prefers_installed,
            incompatibilities,
        )
    }

    fn is_satisfied_by(&self, requirement: &Requirement, candidate: &Rc<Candidate>) -> bool {
        requirement.is_satisfied_by(candidate, &self.cache)
    }

    fn get_dependencies(&self, candidate: &Rc<Candidate>) -> Vec<Requirement> {
        let with_requires = !self.ignore_dependencies;
        candidate
            .iter_dependencies(with_requires)
            .into_iter()
            .flatten()
            .collect()
    }

    /// Names of upper-bounded causes (`<` or `<=`) not already in
    /// `identifiers`. Backjumping through the states that pinned them lets
    /// the solver retry with older releases.
    fn unpin_requirement(
        &self,
        identifiers: &HashSet<Identifier>,
        _resolutions: &HashMap<Identifier, Rc<Candidate>>,
        _candidates: &HashMap<Identifier, Vec<Rc<Candidate>>>,
        _information: &HashMap<Identifier, Vec<PreferenceInformation>>,
        backtrack_causes: &[BacktrackCause],
    ) -> HashSet<Identifier> {
        let mut upper_bounded = HashSet::new();
        for cause in backtrack_causes {
            let Requirement::Specifier(req) = &cause.requirement else {
                continue;
            };
            if req.specifier().operators().any(Operator::is_upper_bound) {
                upper_bounded.insert(req.name().to_string());
                upper_bounded.insert(req.project_name().to_string());
            }
        }

        let unpinned: HashSet<Identifier> = upper_bounded
            .into_iter()
            .filter(|name| !identifiers.contains(name))
            .collect();
        if !unpinned.is_empty() {
            debug!(?unpinned, "unpinning upper-bounded requirements");
        }
        unpinned
    }
}
