use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use lockgraph_util::errors::{LockgraphError, LockgraphResult};

use crate::config::ResolveOptions;
use crate::normalize_name;

/// The parts of a `pyproject.toml` that define resolution configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectSpec {
    #[serde(default)]
    pub project: Option<ProjectTable>,
    /// PEP 735 dependency groups.
    #[serde(default)]
    pub dependency_groups: Option<BTreeMap<String, Vec<GroupEntry>>>,
    #[serde(default)]
    pub tool: ToolTable,
}

/// `[project]`; only the name matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTable {
    pub name: String,
}

/// One entry of a dependency group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupEntry {
    Requirement(String),
    Include {
        #[serde(rename = "include-group")]
        include_group: String,
    },
}

/// `[tool]`; only our own table is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolTable {
    #[serde(default)]
    pub lockgraph: ResolveOptions,
}

impl ProjectSpec {
    /// Load and parse a `pyproject.toml` file from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LockgraphError::Parse {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Ok(Self::parse_toml(&content)?)
    }

    /// Parse a `pyproject.toml` from a string.
    pub fn parse_toml(content: &str) -> LockgraphResult<Self> {
        toml::from_str(content).map_err(|e| LockgraphError::Parse {
            message: format!("Failed to parse pyproject.toml: {e}"),
        })
    }

    /// Resolver options declared under `[tool.lockgraph]`.
    pub fn resolve_options(&self) -> &ResolveOptions {
        &self.tool.lockgraph
    }

    /// Every configuration and its root requirement strings.
    ///
    /// Declared dependency groups each become a configuration, with
    /// `include-group` entries expanded in place. Without groups, the project
    /// name is the single configuration and its only root.
    pub fn configurations(&self) -> LockgraphResult<BTreeMap<String, Vec<String>>> {
        match &self.dependency_groups {
            Some(groups) if !groups.is_empty() => {
                let mut configurations = BTreeMap::new();
                for name in groups.keys() {
                    let mut requirements = Vec::new();
                    let mut visiting = Vec::new();
                    expand_group(groups, name, &mut visiting, &mut requirements)?;
                    configurations.insert(name.clone(), requirements);
                }
                Ok(configurations)
            }
            _ => {
                let project = self.project.as_ref().ok_or_else(|| {
                    LockgraphError::InvalidProject {
                        message: "no [dependency-groups] and no [project].name".to_string(),
                    }
                })?;
                Ok(BTreeMap::from([(
                    project.name.clone(),
                    vec![project.name.clone()],
                )]))
            }
        }
    }
}

fn expand_group(
    groups: &BTreeMap<String, Vec<GroupEntry>>,
    name: &str,
    visiting: &mut Vec<String>,
    out: &mut Vec<String>,
) -> LockgraphResult<usize> {
    let normalized = normalize_name(name);
    let (declared, entries) = groups
        .iter()
        .find(|(k, _)| normalize_name(k) == normalized)
        .ok_or_else(|| LockgraphError::InvalidProject {
            message: format!("included dependency group `{name}` is not declared"),
        })?;

    if visiting.contains(&normalized) {
        visiting.push(normalized);
        return Err(LockgraphError::InvalidProject {
            message: format!("dependency group include cycle: {}", visiting.join(" -> ")),
        });
    }
    visiting.push(normalized);

    let before = out.len();
    for entry in entries {
        match entry {
            GroupEntry::Requirement(req) => out.push(req.clone()),
            GroupEntry::Include { include_group } => {
                expand_group(groups, include_group, visiting, out)?;
            }
        }
    }

    visiting.pop();
    let added = out.len() - before;
    tracing::debug!(group = %declared, requirements = added, "Expanded dependency group");
    Ok(added)
}
