use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use lockgraph_util::errors::{LockgraphError, LockgraphResult};

use crate::BASE_EXTRA;

/// A resolved `uv.lock`, reduced to the fields graph resolution reads.
///
/// Source, sdist and wheel tables are ignored on deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub package: Vec<LockedPackage>,
}

/// A single locked package at one pinned version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<LockedDependency>,
    /// Extra name to the dependencies that extra adds.
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, Vec<LockedDependency>>,
}

/// A dependency edge as written in the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    pub name: String,
    /// Only present when the target is locked at more than one version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Extras of the target this edge activates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl LockedDependency {
    /// Shorthand for an unconditional, version-less dependency on `name`.
    pub fn on(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: None,
            extra: None,
            marker: None,
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn extras(mut self, extras: &[&str]) -> Self {
        self.extra = Some(extras.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn marker(mut self, marker: &str) -> Self {
        self.marker = Some(marker.to_string());
        self
    }

    /// The extras this edge targets; an absent list means the base install.
    pub fn target_extras(&self) -> Vec<&str> {
        match &self.extra {
            Some(extras) => extras.iter().map(String::as_str).collect(),
            None => vec![BASE_EXTRA],
        }
    }

    /// The marker, treating an empty or blank expression as unconditional.
    pub fn marker_expr(&self) -> Option<&str> {
        self.marker
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

impl Lockfile {
    /// Load and parse a `uv.lock` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LockgraphError::Parse {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Ok(Self::parse_toml(&content)?)
    }

    /// Parse a `uv.lock` from a string.
    pub fn parse_toml(content: &str) -> LockgraphResult<Self> {
        let lockfile: Self = toml::from_str(content).map_err(|e| LockgraphError::Parse {
            message: format!("Failed to parse uv.lock: {e}"),
        })?;
        tracing::debug!(packages = lockfile.package.len(), "Parsed lockfile");
        Ok(lockfile)
    }
}
