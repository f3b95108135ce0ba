use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all ordo operations.
#[derive(Debug, Error, Diagnostic)]
pub enum OrdoError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed configuration file.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check your ordo config.toml for syntax errors"))]
    Config { message: String },

    /// A version string that is not valid PEP 440.
    #[error("Invalid version: '{version}'")]
    InvalidVersion { version: String },

    /// A version specifier that could not be parsed.
    #[error("Invalid specifier: '{specifier}': {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    /// A requirement string that could not be parsed.
    #[error("Invalid requirement: '{requirement}': {reason}")]
    InvalidRequirement { requirement: String, reason: String },

    /// A date or datetime that is not ISO 8601.
    #[error("Invalid date: '{value}'")]
    #[diagnostic(help(
        "Use a date such as 2023-01-01, 2023-01-01T00:00:00 or 2023-01-01T00:00:00+00:00"
    ))]
    InvalidDate { value: String },

    /// Package index file missing, unreadable or inconsistent.
    #[error("Index error: {message}")]
    Index { message: String },

    /// A precedence relation would have introduced a cycle.
    #[error("Ordering violation: {message}")]
    OrderingViolation { message: String },

    /// The solver ran out of its round budget.
    #[error("Resolution too deep: gave up after {rounds} rounds")]
    #[diagnostic(help(
        "The dependency graph needs more backtracking than allowed; \
         raise the budget with --max-resolution-rounds or tighten your requirements"
    ))]
    ResolutionTooDeep { rounds: usize },

    /// No combination of candidates satisfies the requirements.
    #[error("Dependency resolution failed: {message}")]
    ResolutionImpossible { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type OrdoResult<T> = miette::Result<T>;
