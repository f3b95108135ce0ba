use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use ordo_util::errors::OrdoError;

/// Default cap on solver rounds before a resolution is abandoned.
pub const DEFAULT_MAX_ROUNDS: usize = 200_000;

/// Global user configuration loaded from `~/.ordo/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Resolver settings from `[resolver]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default, rename = "upgrade-strategy")]
    pub upgrade_strategy: UpgradeStrategy,
    #[serde(default = "default_max_rounds", rename = "max-rounds")]
    pub max_rounds: usize,
    #[serde(default, rename = "ignore-dependencies")]
    pub ignore_dependencies: bool,
    /// Allow pre-releases even when no specifier asks for one.
    #[serde(default)]
    pub pre: bool,
    #[serde(default, rename = "python-version")]
    pub python_version: Option<String>,
    #[serde(default, rename = "ignore-requires-python")]
    pub ignore_requires_python: bool,
    /// Skip releases uploaded at or after this ISO 8601 date or datetime.
    #[serde(
        default,
        rename = "exclude-newer-than",
        alias = "uploaded-prior-to",
        skip_serializing_if = "Option::is_none"
    )]
    pub exclude_newer_than: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            upgrade_strategy: UpgradeStrategy::default(),
            max_rounds: default_max_rounds(),
            ignore_dependencies: false,
            pre: false,
            python_version: None,
            ignore_requires_python: false,
            exclude_newer_than: None,
        }
    }
}

impl ResolverConfig {
    /// The parsed upload cutoff, if one is configured.
    pub fn upload_cutoff(&self) -> Result<Option<DateTime<Utc>>, OrdoError> {
        self.exclude_newer_than.as_deref().map(parse_cutoff).transpose()
    }
}

/// Parse an ISO 8601 date or datetime into a UTC instant. Values without
/// an offset are read in the local timezone; a bare date means midnight.
pub fn parse_cutoff(text: &str) -> Result<DateTime<Utc>, OrdoError> {
    let invalid = || OrdoError::InvalidDate {
        value: text.to_string(),
    };
    let text = text.trim();

    if let Ok(with_offset) = DateTime::<FixedOffset>::parse_from_rfc3339(text) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    let naive = match text.parse::<NaiveDateTime>() {
        Ok(naive) => naive,
        Err(_) => text
            .parse::<NaiveDate>()
            .map_err(|_| invalid())?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(invalid)?,
    };
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

/// Whether already-installed candidates are preferred over newer ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradeStrategy {
    /// Upgrade everything that has a newer candidate.
    Eager,
    /// Upgrade only the projects the user asked for.
    OnlyIfNeeded,
    /// Keep installed versions whenever they satisfy.
    #[default]
    ToSatisfyOnly,
}

impl UpgradeStrategy {
    /// Lenient lookup: unknown names fall back to `ToSatisfyOnly`, which
    /// never allows upgrades.
    pub fn from_name(name: &str) -> Self {
        match name {
            "eager" => UpgradeStrategy::Eager,
            "only-if-needed" => UpgradeStrategy::OnlyIfNeeded,
            _ => UpgradeStrategy::ToSatisfyOnly,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpgradeStrategy::Eager => "eager",
            UpgradeStrategy::OnlyIfNeeded => "only-if-needed",
            UpgradeStrategy::ToSatisfyOnly => "to-satisfy-only",
        }
    }
}

impl fmt::Display for UpgradeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GlobalConfig {
    /// Load the global configuration from `~/.ordo/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from an explicit path, returning defaults when the file is absent.
    pub fn load_from(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrdoError::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            }
        })?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            OrdoError::Config {
                message: format!("Failed to parse config: {e}"),
            }
            .into()
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the path to the ordo data directory (`~/.ordo/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".ordo")
}
