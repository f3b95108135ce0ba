//! Concrete choices the resolver can pin.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use ordo_core::name::make_identifier;
use ordo_core::requirement::RequirementSpec;
use ordo_core::version::Version;

use crate::requirement::Requirement;

/// Identifier of the virtual project standing in for the interpreter.
pub const REQUIRES_PYTHON_IDENTIFIER: &str = "<Python from Requires-Python>";

/// Where a candidate comes from.
#[derive(Debug, Clone)]
pub enum CandidateKind {
    /// A release listed in the package index.
    Index,
    /// A release already present in the environment.
    Installed,
    /// A base candidate with one or more extras enabled.
    Extras { base: Rc<Candidate> },
    /// The running interpreter.
    RequiresPython,
}

/// A declared dependency, optionally enabled only by one of the dependent's
/// extras.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub requirement: Requirement,
    pub extra: Option<String>,
}

impl Dependency {
    pub fn new(requirement: Requirement) -> Self {
        Self {
            requirement,
            extra: None,
        }
    }

    pub fn gated(requirement: Requirement, extra: impl Into<String>) -> Self {
        Self {
            requirement,
            extra: Some(extra.into()),
        }
    }

    /// Build from a parsed requirement string; an `extra == "x"` marker
    /// becomes the gate.
    pub fn from_spec(spec: &RequirementSpec) -> Self {
        Self {
            requirement: Requirement::from_spec(spec),
            extra: spec.marker_extra.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Candidate {
    name: String,
    project_name: String,
    version: Version,
    kind: CandidateKind,
    extras: BTreeSet<String>,
    dependencies: Vec<Dependency>,
    requires_python: Option<Requirement>,
    upload_time: Option<DateTime<Utc>>,
}

impl Candidate {
    /// A release from the package index.
    pub fn release(
        project_name: impl Into<String>,
        version: Version,
        dependencies: Vec<Dependency>,
        requires_python: Option<Requirement>,
    ) -> Self {
        let project_name = project_name.into();
        Self {
            name: project_name.clone(),
            project_name,
            version,
            kind: CandidateKind::Index,
            extras: BTreeSet::new(),
            dependencies,
            requires_python,
            upload_time: None,
        }
    }

    /// Record when the release was published to the index.
    pub fn with_upload_time(mut self, upload_time: Option<DateTime<Utc>>) -> Self {
        self.upload_time = upload_time;
        self
    }

    /// A release already installed in the environment.
    pub fn installed(
        project_name: impl Into<String>,
        version: Version,
        dependencies: Vec<Dependency>,
        requires_python: Option<Requirement>,
    ) -> Self {
        Self {
            kind: CandidateKind::Installed,
            ..Self::release(project_name, version, dependencies, requires_python)
        }
    }

    /// Wrap `base` with extras enabled. The identifier carries the sorted
    /// extras, e.g. `requests[security,socks]`.
    pub fn with_extras(base: Rc<Candidate>, extras: BTreeSet<String>) -> Self {
        Self {
            name: make_identifier(&base.project_name, &extras),
            project_name: base.project_name.clone(),
            version: base.version.clone(),
            upload_time: base.upload_time,
            kind: CandidateKind::Extras { base },
            extras,
            dependencies: Vec::new(),
            requires_python: None,
        }
    }

    /// The interpreter, pinned at `version`.
    pub fn python(version: Version) -> Self {
        Self {
            name: REQUIRES_PYTHON_IDENTIFIER.to_string(),
            project_name: REQUIRES_PYTHON_IDENTIFIER.to_string(),
            version,
            kind: CandidateKind::RequiresPython,
            extras: BTreeSet::new(),
            dependencies: Vec::new(),
            requires_python: None,
            upload_time: None,
        }
    }

    /// Resolver identifier: project name plus extras.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn kind(&self) -> &CandidateKind {
        &self.kind
    }

    pub fn extras(&self) -> &BTreeSet<String> {
        &self.extras
    }

    pub fn is_installed(&self) -> bool {
        match &self.kind {
            CandidateKind::Installed => true,
            CandidateKind::Extras { base } => base.is_installed(),
            _ => false,
        }
    }

    pub fn is_extras(&self) -> bool {
        matches!(self.kind, CandidateKind::Extras { .. })
    }

    pub fn is_python(&self) -> bool {
        matches!(self.kind, CandidateKind::RequiresPython)
    }

    /// Declared dependencies, gated ones included.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn requires_python(&self) -> Option<&Requirement> {
        self.requires_python.as_ref()
    }

    /// Publication time, when the index records one.
    pub fn upload_time(&self) -> Option<&DateTime<Utc>> {
        self.upload_time.as_ref()
    }

    /// Requirements this candidate brings in. `None` marks a slot with
    /// nothing to require (no Requires-Python declared).
    ///
    /// An extras candidate always requires its exact base candidate; the
    /// dependencies its extras enable follow only when `with_requires` is
    /// set. Any other candidate yields its Requires-Python requirement
    /// first, then its ungated dependencies when `with_requires` is set.
    pub fn iter_dependencies(&self, with_requires: bool) -> Vec<Option<Requirement>> {
        match &self.kind {
            CandidateKind::Extras { base } => {
                let mut out = vec![Some(Requirement::Explicit(base.clone()))];
                if with_requires {
                    out.extend(
                        base.dependencies
                            .iter()
                            .filter(|d| d.extra.as_ref().is_some_and(|e| self.extras.contains(e)))
                            .map(|d| Some(d.requirement.clone())),
                    );
                }
                out
            }
            _ => {
                let mut out = vec![self.requires_python.clone()];
                if with_requires {
                    out.extend(
                        self.dependencies
                            .iter()
                            .filter(|d| d.extra.is_none())
                            .map(|d| Some(d.requirement.clone())),
                    );
                }
                out
            }
        }
    }
}

/// Candidates are the same choice when identifier and version agree.
impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for Candidate {}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
