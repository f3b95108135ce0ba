//! Human-readable reporting of resolution conflicts.

use std::fmt;

use crate::provider::BacktrackCause;

/// The requirements that could not be satisfied together.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
}

/// One requirement involved in a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub requirement: String,
    /// `name version` of the candidate that declared it; `None` for
    /// requirements the user asked for directly.
    pub required_by: Option<String>,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from solver causes, dropping duplicates.
    pub fn from_causes(causes: &[BacktrackCause]) -> Self {
        let mut report = Self::new();
        for cause in causes {
            report.add(Conflict {
                requirement: cause.requirement.to_string(),
                required_by: cause.parent.as_ref().map(|p| p.to_string()),
            });
        }
        report
    }

    pub fn add(&mut self, conflict: Conflict) {
        if !self.conflicts.contains(&conflict) {
            self.conflicts.push(conflict);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "no conflicting requirements recorded");
        }
        write!(f, "conflicting requirements ({}):", self.len())?;
        for c in &self.conflicts {
            write!(f, "\n  {c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.required_by {
            Some(parent) => write!(f, "{} (required by {parent})", self.requirement),
            None => write!(f, "{} (requested)", self.requirement),
        }
    }
}
