//! Top-level resolution: root requirements in, ordered pins out.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use ordo_core::config::ResolverConfig;
use ordo_core::name::strip_extras;
use ordo_core::requirement::RequirementSpec;
use ordo_util::errors::{OrdoError, OrdoResult};

use crate::cache::ValueCache;
use crate::candidate::Candidate;
use crate::conflict::ConflictReport;
use crate::constraint::Constraint;
use crate::factory::Factory;
use crate::ordering::OrderedStructure;
use crate::provider::{Identifier, KnownDepths, ProviderOptions, ResolutionProvider};
use crate::requirement::Requirement;
use crate::solver::{self, ResolutionError};

/// Resolves root requirements against a [`Factory`].
pub struct Resolver<F> {
    factory: F,
    config: ResolverConfig,
    constraints: HashMap<String, Constraint>,
    cache: Rc<ValueCache>,
}

impl<F: Factory> Resolver<F> {
    pub fn new(factory: F, config: ResolverConfig, cache: Rc<ValueCache>) -> Self {
        Self {
            factory,
            config,
            constraints: HashMap::new(),
            cache,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Restrict a project's versions without requiring it. Constraints on
    /// the same project are merged.
    pub fn add_constraint(&mut self, spec: &RequirementSpec) {
        let constraint = Constraint::from_spec(spec);
        self.constraints
            .entry(spec.project_name())
            .and_modify(|existing| *existing = existing.merge(&constraint))
            .or_insert(constraint);
    }

    pub fn resolve(&self, requirements: &[RequirementSpec]) -> OrdoResult<Resolution> {
        let mut user_requested = HashMap::new();
        for (order, spec) in requirements.iter().enumerate() {
            user_requested.entry(spec.project_name()).or_insert(order);
        }
        let roots: Vec<Requirement> = requirements.iter().map(Requirement::from_spec).collect();

        let options = ProviderOptions {
            constraints: self.constraints.clone(),
            ignore_dependencies: self.config.ignore_dependencies,
            upgrade_strategy: self.config.upgrade_strategy,
            user_requested,
        };
        let mut provider = ResolutionProvider::new(
            &self.factory,
            options,
            KnownDepths::new(),
            self.cache.clone(),
        );

        info!(
            requirements = roots.len(),
            max_rounds = self.config.max_rounds,
            upgrade_strategy = %self.config.upgrade_strategy,
            "resolving"
        );
        let solution = solver::Resolver::new(&mut provider)
            .resolve(roots, self.config.max_rounds)
            .map_err(into_ordo_error)?;
        debug!(
            rounds = solution.rounds,
            pins = solution.mapping.len(),
            depths = provider.known_depths().len(),
            "resolution complete"
        );

        Ok(Resolution {
            mapping: solution.mapping,
            edges: solution.edges,
            rounds: solution.rounds,
        })
    }
}

fn into_ordo_error(err: ResolutionError<Requirement, Rc<Candidate>>) -> OrdoError {
    match err {
        ResolutionError::TooDeep { rounds } => OrdoError::ResolutionTooDeep { rounds },
        ResolutionError::Impossible { causes } => OrdoError::ResolutionImpossible {
            message: ConflictReport::from_causes(&causes).to_string(),
        },
        ResolutionError::Inconsistent {
            candidate,
            requirements,
        } => {
            let requirements: Vec<String> = requirements.iter().map(ToString::to_string).collect();
            OrdoError::Generic {
                message: format!(
                    "candidate {candidate} does not satisfy {}",
                    requirements.join(", ")
                ),
            }
        }
    }
}

/// A successful resolution.
#[derive(Debug)]
pub struct Resolution {
    mapping: Vec<(Identifier, Rc<Candidate>)>,
    edges: Vec<(Option<Identifier>, Identifier)>,
    rounds: usize,
}

impl Resolution {
    /// Every pin, extras and interpreter included, in pinning order.
    pub fn mapping(&self) -> &[(Identifier, Rc<Candidate>)] {
        &self.mapping
    }

    /// Chosen release per project.
    pub fn pins(&self) -> BTreeMap<String, Rc<Candidate>> {
        self.mapping
            .iter()
            .filter(|(_, c)| !c.is_extras() && !c.is_python())
            .map(|(_, c)| (c.project_name().to_string(), c.clone()))
            .collect()
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Projects each pinned project depends on, by project name.
    pub fn dependencies(&self) -> BTreeMap<String, Vec<String>> {
        let pins = self.pins();
        let mut out: BTreeMap<String, Vec<String>> =
            pins.keys().map(|k| (k.clone(), Vec::new())).collect();
        for (dependent, dependency) in self.project_edges(&pins) {
            if let Some(deps) = out.get_mut(&dependent) {
                deps.push(dependency);
            }
        }
        out
    }

    /// Pins ordered so that dependencies come before their dependents.
    /// Edges that would close a dependency cycle are dropped.
    pub fn installation_order(&self) -> Vec<Rc<Candidate>> {
        let pins = self.pins();
        let mut order = OrderedStructure::new();
        for name in pins.keys() {
            order.add_element(name.clone());
        }
        for (dependent, dependency) in self.project_edges(&pins) {
            if let Err(err) = order.add_relation(dependency, dependent) {
                debug!(%err, "skipping edge in dependency cycle");
            }
        }
        order
            .topological_sort()
            .into_iter()
            .filter_map(|name| pins.get(&name).cloned())
            .collect()
    }

    /// Serialisable summary in installation order.
    pub fn report(&self) -> ResolutionReport {
        let dependencies = self.dependencies();
        let packages = self
            .installation_order()
            .into_iter()
            .map(|c| ResolvedPackage {
                name: c.project_name().to_string(),
                version: c.version().to_string(),
                installed: c.is_installed(),
                dependencies: dependencies
                    .get(c.project_name())
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        ResolutionReport {
            rounds: self.rounds,
            packages,
        }
    }

    /// Sorted, deduplicated `(dependent, dependency)` pairs between pinned
    /// projects.
    fn project_edges(&self, pins: &BTreeMap<String, Rc<Candidate>>) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .edges
            .iter()
            .filter_map(|(parent, child)| {
                let parent = strip_extras(parent.as_deref()?);
                let child = strip_extras(child);
                (parent != child && pins.contains_key(parent) && pins.contains_key(child))
                    .then(|| (parent.to_string(), child.to_string()))
            })
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub rounds: usize,
    pub packages: Vec<ResolvedPackage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    pub installed: bool,
    pub dependencies: Vec<String>,
}
