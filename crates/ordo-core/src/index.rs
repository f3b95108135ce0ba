use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional file name of a local package index.
pub const INDEX_FILE_NAME: &str = "ordo-index.toml";

/// A local package index: every release the resolver may choose from, plus
/// what is already installed in the target environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFile {
    /// Interpreter version used for `Requires-Python` checks.
    #[serde(default)]
    pub python: Option<String>,
    #[serde(default)]
    pub package: Vec<IndexRelease>,
    #[serde(default)]
    pub installed: Vec<InstalledRelease>,
}

/// One release of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRelease {
    pub name: String,
    pub version: String,
    #[serde(default, rename = "requires-python")]
    pub requires_python: Option<String>,
    /// Requirement strings, e.g. `"idna>=2.5,<4"` or `"pysocks; extra == 'socks'"`.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// When the release was published, as an RFC 3339 string.
    #[serde(
        default,
        rename = "upload-time",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_time: Option<DateTime<Utc>>,
}

/// A release already present in the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledRelease {
    pub name: String,
    pub version: String,
}

impl IndexFile {
    /// Load and parse an index file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = ordo_util::fs::read_text(path)?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            ordo_util::errors::OrdoError::Index {
                message: format!("Failed to parse index: {e}"),
            }
            .into()
        })
    }

    /// Serialize the index to a pretty-printed TOML string.
    pub fn to_string_pretty(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
