//! Candidate discovery against an in-memory package index.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use ordo_core::config::ResolverConfig;
use ordo_core::index::IndexFile;
use ordo_core::name::{identifier_extras, strip_extras};
use ordo_core::requirement::RequirementSpec;
use ordo_core::specifier::SpecifierSet;
use ordo_core::version::Version;
use ordo_util::errors::{OrdoError, OrdoResult};

use crate::cache::ValueCache;
use crate::candidate::{Candidate, Dependency, REQUIRES_PYTHON_IDENTIFIER};
use crate::constraint::Constraint;
use crate::requirement::Requirement;

/// Interpreter version assumed when neither the config nor the index names one.
pub const DEFAULT_PYTHON_VERSION: &str = "3.12";

pub type RequirementMap = HashMap<String, Vec<Requirement>>;
pub type CandidateMap = HashMap<String, Vec<Rc<Candidate>>>;

/// Source of candidates for the provider.
pub trait Factory {
    /// Candidates for `identifier` that satisfy every requirement recorded
    /// for it and the constraint, excluding known incompatibilities, most
    /// preferred first.
    fn find_candidates(
        &self,
        identifier: &str,
        requirements: &RequirementMap,
        constraint: &Constraint,
        prefers_installed: bool,
        incompatibilities: &CandidateMap,
    ) -> Vec<Rc<Candidate>>;
}

impl<F: Factory + ?Sized> Factory for &F {
    fn find_candidates(
        &self,
        identifier: &str,
        requirements: &RequirementMap,
        constraint: &Constraint,
        prefers_installed: bool,
        incompatibilities: &CandidateMap,
    ) -> Vec<Rc<Candidate>> {
        (**self).find_candidates(
            identifier,
            requirements,
            constraint,
            prefers_installed,
            incompatibilities,
        )
    }
}

/// Releases of every project, plus what is installed and which interpreter
/// runs.
pub struct IndexFactory {
    /// Canonical project name to releases, newest first.
    projects: HashMap<String, Vec<Rc<Candidate>>>,
    installed: HashMap<String, Rc<Candidate>>,
    python: Rc<Candidate>,
    allow_prereleases: bool,
    ignore_requires_python: bool,
    /// Releases uploaded at or after this instant are skipped.
    uploaded_prior_to: Option<DateTime<Utc>>,
    cache: Rc<ValueCache>,
}

impl IndexFactory {
    pub fn new(python_version: Version, cache: Rc<ValueCache>) -> Self {
        Self {
            projects: HashMap::new(),
            installed: HashMap::new(),
            python: Rc::new(Candidate::python(python_version)),
            allow_prereleases: false,
            ignore_requires_python: false,
            uploaded_prior_to: None,
            cache,
        }
    }

    pub fn allow_prereleases(mut self, allow: bool) -> Self {
        self.allow_prereleases = allow;
        self
    }

    pub fn ignore_requires_python(mut self, ignore: bool) -> Self {
        self.ignore_requires_python = ignore;
        self
    }

    pub fn uploaded_prior_to(mut self, cutoff: Option<DateTime<Utc>>) -> Self {
        self.uploaded_prior_to = cutoff;
        self
    }

    /// Build a factory from an index file. The interpreter version comes
    /// from the config, then the index, then [`DEFAULT_PYTHON_VERSION`].
    pub fn from_index(
        index: &IndexFile,
        config: &ResolverConfig,
        cache: Rc<ValueCache>,
    ) -> OrdoResult<Self> {
        let python = config
            .python_version
            .as_deref()
            .or(index.python.as_deref())
            .unwrap_or(DEFAULT_PYTHON_VERSION);
        let python = cache.parse_strict_version(python)?;

        let mut factory = Self::new(python, cache)
            .allow_prereleases(config.pre)
            .ignore_requires_python(config.ignore_requires_python)
            .uploaded_prior_to(config.upload_cutoff()?);
        for release in &index.package {
            factory.add_release(
                &release.name,
                &release.version,
                &release.dependencies,
                release.requires_python.as_deref(),
                release.upload_time,
            )?;
        }
        for installed in &index.installed {
            factory.add_installed(&installed.name, &installed.version)?;
        }
        debug!(
            projects = factory.projects.len(),
            installed = factory.installed.len(),
            python = %factory.python.version(),
            "loaded package index"
        );
        Ok(factory)
    }

    /// Register a release. Duplicate releases are ignored with a warning.
    /// A release without an upload time is never skipped by the cutoff.
    pub fn add_release<S: AsRef<str>>(
        &mut self,
        name: &str,
        version: &str,
        dependencies: &[S],
        requires_python: Option<&str>,
        upload_time: Option<DateTime<Utc>>,
    ) -> Result<(), OrdoError> {
        let project = self.cache.canonicalize_name(name);
        let version = self.cache.parse_strict_version(version)?;
        let dependencies = dependencies
            .iter()
            .map(|text| RequirementSpec::parse(text.as_ref()).map(|spec| Dependency::from_spec(&spec)))
            .collect::<Result<Vec<_>, _>>()?;
        let requires_python = match requires_python {
            Some(text) if !self.ignore_requires_python => {
                let specifier = SpecifierSet::parse(text)?;
                (!specifier.is_empty())
                    .then(|| Requirement::requires_python(specifier, self.python.clone()))
            }
            _ => None,
        };

        let releases = self.projects.entry(project.clone()).or_default();
        if releases.iter().any(|c| *c.version() == version) {
            warn!("duplicate release {project} {version} ignored");
            return Ok(());
        }
        releases.push(Rc::new(
            Candidate::release(project, version, dependencies, requires_python)
                .with_upload_time(upload_time),
        ));
        releases.sort_by(|a, b| b.version().cmp(a.version()));
        Ok(())
    }

    /// Mark a release as installed. Dependencies are taken from the index
    /// release with the same version, when there is one.
    pub fn add_installed(&mut self, name: &str, version: &str) -> Result<(), OrdoError> {
        let project = self.cache.canonicalize_name(name);
        let version = self.cache.parse_strict_version(version)?;
        let indexed = self
            .projects
            .get(&project)
            .and_then(|releases| releases.iter().find(|c| *c.version() == version));
        let (dependencies, requires_python) = match indexed {
            Some(release) => (
                release.dependencies().to_vec(),
                release.requires_python().cloned(),
            ),
            None => {
                debug!("installed {project} {version} is not in the index");
                (Vec::new(), None)
            }
        };
        let candidate = Candidate::installed(project.clone(), version, dependencies, requires_python);
        self.installed.insert(project, Rc::new(candidate));
        Ok(())
    }

    pub fn python(&self) -> &Rc<Candidate> {
        &self.python
    }

    /// Releases of a project, newest first.
    pub fn releases(&self, project: &str) -> &[Rc<Candidate>] {
        self.projects.get(project).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn installed(&self, project: &str) -> Option<&Rc<Candidate>> {
        self.installed.get(project)
    }

    fn python_compatible(&self, release: &Candidate) -> bool {
        match release.requires_python() {
            Some(requirement) => requirement.is_satisfied_by(&self.python, &self.cache),
            None => true,
        }
    }

    fn uploaded_in_time(&self, release: &Candidate) -> bool {
        match (self.uploaded_prior_to, release.upload_time()) {
            (Some(cutoff), Some(uploaded)) if *uploaded >= cutoff => {
                debug!(
                    "skipping {} {} uploaded at {uploaded}",
                    release.project_name(),
                    release.version()
                );
                false
            }
            _ => true,
        }
    }

    fn wrap(release: &Rc<Candidate>, extras: &BTreeSet<String>) -> Rc<Candidate> {
        if extras.is_empty() {
            release.clone()
        } else {
            Rc::new(Candidate::with_extras(release.clone(), extras.clone()))
        }
    }
}

impl Factory for IndexFactory {
    fn find_candidates(
        &self,
        identifier: &str,
        requirements: &RequirementMap,
        constraint: &Constraint,
        prefers_installed: bool,
        incompatibilities: &CandidateMap,
    ) -> Vec<Rc<Candidate>> {
        let requirements = requirements
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let incompatible = incompatibilities
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let is_incompatible = |c: &Candidate| incompatible.iter().any(|i| **i == *c);
        let acceptable = |c: &Candidate| {
            !is_incompatible(c)
                && constraint.is_satisfied_by(c, &self.cache)
                && requirements.iter().all(|r| r.is_satisfied_by(c, &self.cache))
        };

        if identifier == REQUIRES_PYTHON_IDENTIFIER {
            return if acceptable(&self.python) {
                vec![self.python.clone()]
            } else {
                Vec::new()
            };
        }

        let mut explicit = requirements.iter().filter_map(|r| match r {
            Requirement::Explicit(candidate) => Some(candidate),
            _ => None,
        });
        if let Some(first) = explicit.next() {
            if explicit.any(|other| other != first) || !acceptable(first) {
                return Vec::new();
            }
            return vec![first.clone()];
        }

        let project = strip_extras(identifier);
        let extras = identifier_extras(identifier);
        let allow_prereleases = self.allow_prereleases
            || constraint.specifier().allows_prereleases()
            || requirements
                .iter()
                .any(|r| r.specifier().is_some_and(SpecifierSet::allows_prereleases));

        let select = |allow_prereleases: bool| -> Vec<Rc<Candidate>> {
            self.releases(project)
                .iter()
                .filter(|release| allow_prereleases || !release.version().is_prerelease())
                .filter(|release| self.python_compatible(release))
                .filter(|release| self.uploaded_in_time(release))
                .map(|release| Self::wrap(release, &extras))
                .filter(|c| acceptable(c))
                .collect()
        };
        let mut found = select(allow_prereleases);
        if found.is_empty() && !allow_prereleases {
            found = select(true);
            if !found.is_empty() {
                debug!("only pre-releases of {identifier} match, allowing them");
            }
        }

        if let Some(installed) = self.installed.get(project) {
            let installed = Self::wrap(installed, &extras);
            if acceptable(&installed) {
                let same = found.iter().position(|c| c.version() == installed.version());
                match (same, prefers_installed) {
                    (Some(pos), false) => found[pos] = installed,
                    (Some(pos), true) => {
                        found.remove(pos);
                        found.insert(0, installed);
                    }
                    (None, true) => found.insert(0, installed),
                    (None, false) => {
                        let pos = found
                            .iter()
                            .position(|c| c.version() < installed.version())
                            .unwrap_or(found.len());
                        found.insert(pos, installed);
                    }
                }
            }
        }

        trace!(identifier, count = found.len(), prefers_installed, "found candidates");
        found
    }
}
