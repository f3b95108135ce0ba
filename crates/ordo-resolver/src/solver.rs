//! Backtracking resolution over an abstract [`Provider`].
//!
//! The solver keeps a stack of states. Each round picks the unsatisfied
//! identifier the provider prefers most, pins the first of its candidates
//! whose dependencies merge cleanly, and pushes a new state. When every
//! candidate for an identifier fails, it backjumps to the most recent state
//! whose pin contributed to the failure and retries with the failing pin
//! marked incompatible.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use thiserror::Error;
use tracing::debug;

/// Either side of the resolver's input, for [`Provider::identify`].
#[derive(Debug, Clone, Copy)]
pub enum RequirementOrCandidate<'a, R, C> {
    Requirement(&'a R),
    Candidate(&'a C),
}

/// A requirement together with the candidate that introduced it; `None`
/// marks a root requirement.
#[derive(Debug, Clone)]
pub struct RequirementInformation<R, C> {
    pub requirement: R,
    pub parent: Option<C>,
}

pub type Information<P> =
    RequirementInformation<<P as Provider>::Requirement, <P as Provider>::Candidate>;

/// Domain knowledge the solver consults. All decisions about naming,
/// candidate discovery, satisfaction and search order live here.
pub trait Provider {
    type Identifier: Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display;
    type Requirement: Clone + fmt::Debug;
    type Candidate: Clone + fmt::Debug;
    type Preference: Ord;

    fn identify(
        &self,
        item: RequirementOrCandidate<'_, Self::Requirement, Self::Candidate>,
    ) -> Self::Identifier;

    /// Sort key for an unsatisfied identifier; the smallest key is worked on
    /// next.
    fn get_preference(
        &mut self,
        identifier: &Self::Identifier,
        resolutions: &HashMap<Self::Identifier, Self::Candidate>,
        candidates: &HashMap<Self::Identifier, Vec<Self::Candidate>>,
        information: &HashMap<Self::Identifier, Vec<Information<Self>>>,
        backtrack_causes: &[Information<Self>],
    ) -> Self::Preference;

    /// Candidates for `identifier`, most preferred first.
    fn find_matches(
        &self,
        identifier: &Self::Identifier,
        requirements: &HashMap<Self::Identifier, Vec<Self::Requirement>>,
        incompatibilities: &HashMap<Self::Identifier, Vec<Self::Candidate>>,
    ) -> Vec<Self::Candidate>;

    fn is_satisfied_by(&self, requirement: &Self::Requirement, candidate: &Self::Candidate)
        -> bool;

    fn get_dependencies(&self, candidate: &Self::Candidate) -> Vec<Self::Requirement>;

    /// Extra identifiers whose pinning state the solver should backjump
    /// through, on top of the ones named by the conflict itself.
    fn unpin_requirement(
        &self,
        _identifiers: &HashSet<Self::Identifier>,
        _resolutions: &HashMap<Self::Identifier, Self::Candidate>,
        _candidates: &HashMap<Self::Identifier, Vec<Self::Candidate>>,
        _information: &HashMap<Self::Identifier, Vec<Information<Self>>>,
        _backtrack_causes: &[Information<Self>],
    ) -> HashSet<Self::Identifier> {
        HashSet::new()
    }
}

/// What is known about one identifier in one state.
#[derive(Debug, Clone)]
pub struct Criterion<R, C> {
    /// Remaining candidates, most preferred first.
    pub candidates: Vec<C>,
    pub information: Vec<RequirementInformation<R, C>>,
    pub incompatibilities: Vec<C>,
}

impl<R, C> Criterion<R, C> {
    pub fn iter_requirement(&self) -> impl Iterator<Item = &R> {
        self.information.iter().map(|info| &info.requirement)
    }

    pub fn iter_parent(&self) -> impl Iterator<Item = Option<&C>> {
        self.information.iter().map(|info| info.parent.as_ref())
    }
}

#[derive(Debug, Error)]
pub enum ResolutionError<R, C>
where
    R: fmt::Debug,
    C: fmt::Debug,
{
    /// Every candidate for some identifier conflicts with the requirements
    /// in `causes`, and no earlier pin can be changed to help.
    #[error("resolution impossible: {} conflicting requirement(s)", .causes.len())]
    Impossible {
        causes: Vec<RequirementInformation<R, C>>,
    },

    #[error("resolution too deep: gave up after {rounds} rounds")]
    TooDeep { rounds: usize },

    /// The provider offered a candidate that fails its own requirements.
    #[error("provider returned a candidate that does not satisfy its criterion")]
    Inconsistent {
        candidate: C,
        requirements: Vec<R>,
    },
}

type SolverError<P> = ResolutionError<<P as Provider>::Requirement, <P as Provider>::Candidate>;
type Criteria<P> = HashMap<
    <P as Provider>::Identifier,
    Criterion<<P as Provider>::Requirement, <P as Provider>::Candidate>,
>;

/// Outcome of a successful resolution.
pub struct Solution<P: Provider> {
    /// Pins in the order they were made.
    pub mapping: Vec<(P::Identifier, P::Candidate)>,
    pub criteria: Criteria<P>,
    /// `(parent, child)` edges between pinned identifiers; `None` is the root.
    pub edges: Vec<(Option<P::Identifier>, P::Identifier)>,
    /// Rounds spent, including the final one that found nothing left to do.
    pub rounds: usize,
}

impl<P: Provider> fmt::Debug for Solution<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solution")
            .field("mapping", &self.mapping)
            .field("edges", &self.edges)
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

struct State<P: Provider> {
    mapping: Vec<(P::Identifier, P::Candidate)>,
    criteria: Criteria<P>,
    backtrack_causes: Vec<Information<P>>,
}

impl<P: Provider> Clone for State<P> {
    fn clone(&self) -> Self {
        Self {
            mapping: self.mapping.clone(),
            criteria: self.criteria.clone(),
            backtrack_causes: self.backtrack_causes.clone(),
        }
    }
}

impl<P: Provider> State<P> {
    fn empty() -> Self {
        Self {
            mapping: Vec::new(),
            criteria: HashMap::new(),
            backtrack_causes: Vec::new(),
        }
    }

    fn pinned(&self, identifier: &P::Identifier) -> Option<&P::Candidate> {
        self.mapping
            .iter()
            .find(|(name, _)| name == identifier)
            .map(|(_, candidate)| candidate)
    }
}

/// Read-only views of a state in the shape the provider hooks take.
struct Views<P: Provider> {
    resolutions: HashMap<P::Identifier, P::Candidate>,
    candidates: HashMap<P::Identifier, Vec<P::Candidate>>,
    information: HashMap<P::Identifier, Vec<Information<P>>>,
}

impl<P: Provider> Views<P> {
    fn of(state: &State<P>) -> Self {
        Self {
            resolutions: state.mapping.iter().cloned().collect(),
            candidates: state
                .criteria
                .iter()
                .map(|(k, c)| (k.clone(), c.candidates.clone()))
                .collect(),
            information: state
                .criteria
                .iter()
                .map(|(k, c)| (k.clone(), c.information.clone()))
                .collect(),
        }
    }
}

pub struct Resolver<'p, P: Provider> {
    provider: &'p mut P,
    states: Vec<State<P>>,
}

impl<'p, P: Provider> Resolver<'p, P> {
    pub fn new(provider: &'p mut P) -> Self {
        Self {
            provider,
            states: Vec::new(),
        }
    }

    /// Resolve `requirements`, giving up after `max_rounds` rounds.
    pub fn resolve(
        mut self,
        requirements: impl IntoIterator<Item = P::Requirement>,
        max_rounds: usize,
    ) -> Result<Solution<P>, SolverError<P>> {
        let mut root = State::empty();
        for requirement in requirements {
            if let Err(criterion) = self.add_to_criteria(&mut root.criteria, requirement, None) {
                return Err(ResolutionError::Impossible {
                    causes: criterion.information,
                });
            }
        }
        // The root state stays at the bottom as a sentinel so the first pin
        // has something to backtrack to.
        self.states = vec![root];
        self.push_new_state();

        for round in 0..max_rounds {
            let unsatisfied = self.unsatisfied_names();
            debug!(round, unsatisfied = unsatisfied.len(), "resolution round");

            let satisfied: HashSet<P::Identifier> = self
                .state()
                .criteria
                .keys()
                .filter(|k| !unsatisfied.contains(k))
                .cloned()
                .collect();

            let Some(name) = self.choose(unsatisfied) else {
                return Ok(self.build_solution(round + 1));
            };
            let failures = self.attempt_to_pin_criterion(&name)?;

            if failures.is_empty() {
                let newly_unsatisfied: HashSet<P::Identifier> = satisfied
                    .into_iter()
                    .filter(|k| !self.is_current_pin_satisfying(k))
                    .collect();
                self.remove_information_from_criteria(&newly_unsatisfied);
                self.push_new_state();
                continue;
            }

            let causes: Vec<Information<P>> = failures
                .into_iter()
                .flat_map(|criterion| criterion.information)
                .collect();
            debug!(%name, causes = causes.len(), "no candidate pins cleanly, backjumping");
            let success = self.backjump(&causes)?;
            self.state_mut().backtrack_causes = causes;
            if !success {
                return Err(ResolutionError::Impossible {
                    causes: self.state().backtrack_causes.clone(),
                });
            }
        }

        Err(ResolutionError::TooDeep { rounds: max_rounds })
    }

    fn state(&self) -> &State<P> {
        // Non-empty from the moment resolution starts.
        &self.states[self.states.len() - 1]
    }

    fn state_mut(&mut self) -> &mut State<P> {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    fn push_new_state(&mut self) {
        let next = self.state().clone();
        self.states.push(next);
    }

    fn unsatisfied_names(&self) -> Vec<P::Identifier> {
        let mut names: Vec<P::Identifier> = self
            .state()
            .criteria
            .keys()
            .filter(|k| !self.is_current_pin_satisfying(k))
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn is_current_pin_satisfying(&self, name: &P::Identifier) -> bool {
        let state = self.state();
        let (Some(pin), Some(criterion)) = (state.pinned(name), state.criteria.get(name)) else {
            return false;
        };
        criterion
            .iter_requirement()
            .all(|r| self.provider.is_satisfied_by(r, pin))
    }

    /// The identifier with the smallest preference key, or `None` when
    /// everything is satisfied.
    fn choose(&mut self, unsatisfied: Vec<P::Identifier>) -> Option<P::Identifier> {
        if unsatisfied.is_empty() {
            return None;
        }
        let state = &self.states[self.states.len() - 1];
        let views = Views::of(state);
        let causes = &state.backtrack_causes;
        let provider = &mut *self.provider;
        let mut best: Option<(P::Preference, P::Identifier)> = None;
        for name in unsatisfied {
            let preference = provider.get_preference(
                &name,
                &views.resolutions,
                &views.candidates,
                &views.information,
                causes,
            );
            if best.as_ref().map_or(true, |(b, _)| preference < *b) {
                best = Some((preference, name));
            }
        }
        best.map(|(_, name)| name)
    }

    fn requirement_map(criteria: &Criteria<P>) -> HashMap<P::Identifier, Vec<P::Requirement>> {
        criteria
            .iter()
            .map(|(k, c)| (k.clone(), c.iter_requirement().cloned().collect()))
            .collect()
    }

    fn incompatibility_map(criteria: &Criteria<P>) -> HashMap<P::Identifier, Vec<P::Candidate>> {
        criteria
            .iter()
            .map(|(k, c)| (k.clone(), c.incompatibilities.clone()))
            .collect()
    }

    /// Merge `requirement` into `criteria`. On conflict the criterion that
    /// would have had no candidates is returned and `criteria` is untouched.
    fn add_to_criteria(
        &self,
        criteria: &mut Criteria<P>,
        requirement: P::Requirement,
        parent: Option<P::Candidate>,
    ) -> Result<(), Criterion<P::Requirement, P::Candidate>> {
        let identifier = self
            .provider
            .identify(RequirementOrCandidate::Requirement(&requirement));

        let mut requirements = Self::requirement_map(criteria);
        requirements
            .entry(identifier.clone())
            .or_default()
            .push(requirement.clone());
        let incompatibilities = Self::incompatibility_map(criteria);
        let matches = self
            .provider
            .find_matches(&identifier, &requirements, &incompatibilities);

        let (mut information, incompatibilities) = match criteria.get(&identifier) {
            Some(existing) => (
                existing.information.clone(),
                existing.incompatibilities.clone(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        information.push(RequirementInformation {
            requirement,
            parent,
        });
        let criterion = Criterion {
            candidates: matches,
            information,
            incompatibilities,
        };
        if criterion.candidates.is_empty() {
            return Err(criterion);
        }
        criteria.insert(identifier, criterion);
        Ok(())
    }

    fn updated_criteria(
        &self,
        candidate: &P::Candidate,
    ) -> Result<Criteria<P>, Criterion<P::Requirement, P::Candidate>> {
        let mut criteria = self.state().criteria.clone();
        for requirement in self.provider.get_dependencies(candidate) {
            self.add_to_criteria(&mut criteria, requirement, Some(candidate.clone()))?;
        }
        Ok(criteria)
    }

    /// Pin the first workable candidate for `name`. Returns the criteria
    /// that rejected every candidate, or an empty list on success.
    fn attempt_to_pin_criterion(
        &mut self,
        name: &P::Identifier,
    ) -> Result<Vec<Criterion<P::Requirement, P::Candidate>>, SolverError<P>> {
        let Some(criterion) = self.state().criteria.get(name).cloned() else {
            return Ok(Vec::new());
        };
        let mut causes = Vec::new();
        for candidate in &criterion.candidates {
            let criteria = match self.updated_criteria(candidate) {
                Ok(criteria) => criteria,
                Err(conflict) => {
                    debug!(%name, "rejecting candidate {candidate:?}");
                    causes.push(conflict);
                    continue;
                }
            };

            let satisfied = criterion
                .iter_requirement()
                .all(|r| self.provider.is_satisfied_by(r, candidate));
            if !satisfied {
                return Err(ResolutionError::Inconsistent {
                    candidate: candidate.clone(),
                    requirements: criterion.iter_requirement().cloned().collect(),
                });
            }

            debug!(%name, "pinning {candidate:?}");
            let state = self.state_mut();
            state.criteria.extend(criteria);
            // Newest pin goes last; backjumping pops from the end.
            state.mapping.retain(|(k, _)| k != name);
            state.mapping.push((name.clone(), candidate.clone()));
            return Ok(Vec::new());
        }
        Ok(causes)
    }

    /// Drop requirement information contributed by parents that are no
    /// longer satisfied.
    fn remove_information_from_criteria(&mut self, parents: &HashSet<P::Identifier>) {
        if parents.is_empty() {
            return;
        }
        let provider = &*self.provider;
        let last = self.states.len() - 1;
        let state = &mut self.states[last];
        for criterion in state.criteria.values_mut() {
            criterion.information.retain(|info| match &info.parent {
                Some(parent) => {
                    !parents.contains(&provider.identify(RequirementOrCandidate::Candidate(parent)))
                }
                None => true,
            });
        }
    }

    /// Unwind to a state where a pin involved in the conflict can change.
    fn backjump(&mut self, causes: &[Information<P>]) -> Result<bool, SolverError<P>> {
        let mut incompatible_deps: HashSet<P::Identifier> = HashSet::new();
        for cause in causes {
            if let Some(parent) = &cause.parent {
                incompatible_deps.insert(
                    self.provider
                        .identify(RequirementOrCandidate::Candidate(parent)),
                );
            }
            incompatible_deps.insert(
                self.provider
                    .identify(RequirementOrCandidate::Requirement(&cause.requirement)),
            );
        }

        let unpinned = {
            let views = Views::of(self.state());
            self.provider.unpin_requirement(
                &incompatible_deps,
                &views.resolutions,
                &views.candidates,
                &views.information,
                causes,
            )
        };
        if !unpinned.is_empty() {
            debug!(widened = ?unpinned, "backjump widened by upper-bounded causes");
        }
        incompatible_deps.extend(unpinned.iter().cloned());

        while self.states.len() >= 3 {
            // Discard the state that triggered the backjump.
            self.states.pop();

            let (broken, name, candidate) = loop {
                let Some(mut broken) = self.states.pop() else {
                    return Err(ResolutionError::Impossible {
                        causes: causes.to_vec(),
                    });
                };
                let Some((name, candidate)) = broken.mapping.pop() else {
                    return Err(ResolutionError::Impossible {
                        causes: causes.to_vec(),
                    });
                };
                let involved = unpinned.contains(&name)
                    || self.provider.get_dependencies(&candidate).iter().any(|d| {
                        incompatible_deps.contains(
                            &self
                                .provider
                                .identify(RequirementOrCandidate::Requirement(d)),
                        )
                    });
                if involved {
                    break (broken, name, candidate);
                }
            };
            debug!(%name, "backjumped past {candidate:?}");

            let mut from_broken: Vec<(P::Identifier, Vec<P::Candidate>)> = broken
                .criteria
                .into_iter()
                .map(|(k, c)| (k, c.incompatibilities))
                .collect();
            from_broken.push((name, vec![candidate]));

            if self.states.is_empty() {
                return Err(ResolutionError::Impossible {
                    causes: causes.to_vec(),
                });
            }
            self.push_new_state();
            if self.patch_criteria(from_broken) {
                return Ok(true);
            }
            // The patched state still fails; try an older one.
        }
        Ok(false)
    }

    /// Apply incompatibilities learned from a discarded state to the current
    /// one. False when some identifier is left without candidates.
    fn patch_criteria(
        &mut self,
        incompatibilities_from_broken: Vec<(P::Identifier, Vec<P::Candidate>)>,
    ) -> bool {
        for (key, mut incompatibilities) in incompatibilities_from_broken {
            if incompatibilities.is_empty() {
                continue;
            }
            let Some(criterion) = self.state().criteria.get(&key) else {
                continue;
            };
            let requirements = Self::requirement_map(&self.state().criteria);
            let mut incompatibility_map = Self::incompatibility_map(&self.state().criteria);
            // Known incompatibilities stay excluded alongside the broken ones.
            incompatibility_map
                .entry(key.clone())
                .or_default()
                .extend(incompatibilities.iter().cloned());
            let matches = self
                .provider
                .find_matches(&key, &requirements, &incompatibility_map);
            if matches.is_empty() {
                return false;
            }
            incompatibilities.extend(criterion.incompatibilities.iter().cloned());
            let information = criterion.information.clone();
            self.state_mut().criteria.insert(
                key,
                Criterion {
                    candidates: matches,
                    information,
                    incompatibilities,
                },
            );
        }
        true
    }

    fn build_solution(mut self, rounds: usize) -> Solution<P> {
        let state = self.states.pop().unwrap_or_else(State::empty);
        let pinned: HashSet<&P::Identifier> = state.mapping.iter().map(|(k, _)| k).collect();
        let mut edges = Vec::new();
        for (key, _) in &state.mapping {
            let Some(criterion) = state.criteria.get(key) else {
                continue;
            };
            for parent in criterion.iter_parent() {
                let parent = parent.map(|p| {
                    self.provider
                        .identify(RequirementOrCandidate::Candidate(p))
                });
                if let Some(p) = &parent {
                    if !pinned.contains(p) {
                        continue;
                    }
                }
                edges.push((parent, key.clone()));
            }
        }
        Solution {
            mapping: state.mapping,
            criteria: state.criteria,
            edges,
            rounds,
        }
    }
}
