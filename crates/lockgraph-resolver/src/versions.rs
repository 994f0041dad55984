//! Lock-wide version bookkeeping: which versions each package is pinned at,
//! and the default version of packages pinned exactly once.

use std::collections::{BTreeMap, BTreeSet};

use lockgraph_core::config::ResolveOptions;
use lockgraph_core::lockfile::Lockfile;
use lockgraph_core::normalize_name;
use lockgraph_util::errors::{LockgraphError, LockgraphResult};

/// The versions of one package, under the name the lockfile spells it with.
#[derive(Debug, Clone)]
struct LockedVersions {
    name: String,
    versions: BTreeSet<String>,
}

/// Every version string declared for each package name.
///
/// Lookups go through [`normalize_name`], so `Typing_Extensions` finds the
/// locked `typing-extensions`.
#[derive(Debug, Clone, Default)]
pub struct PackageVersions {
    by_name: BTreeMap<String, LockedVersions>,
}

impl PackageVersions {
    pub fn from_lockfile(lockfile: &Lockfile) -> Self {
        let mut by_name: BTreeMap<String, LockedVersions> = BTreeMap::new();
        for pkg in &lockfile.package {
            by_name
                .entry(normalize_name(&pkg.name))
                .or_insert_with(|| LockedVersions {
                    name: pkg.name.clone(),
                    versions: BTreeSet::new(),
                })
                .versions
                .insert(pkg.version.clone());
        }
        Self { by_name }
    }

    /// The single locked version of `name`, if there is exactly one.
    pub fn default_version(&self, name: &str) -> Option<&str> {
        let locked = self.by_name.get(&normalize_name(name))?;
        if locked.versions.len() == 1 {
            locked.versions.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Locked name to version for every package locked at exactly one version.
    pub fn default_versions(&self) -> BTreeMap<String, String> {
        self.by_name
            .values()
            .filter(|locked| locked.versions.len() == 1)
            .filter_map(|locked| {
                locked
                    .versions
                    .iter()
                    .next()
                    .map(|v| (locked.name.clone(), v.clone()))
            })
            .collect()
    }

    /// Pick the package a reference to `name` points at, as
    /// `(locked name, version)`.
    ///
    /// An explicit version must be declared; an omitted one falls back to
    /// the default version. `Ok(None)` means the reference dangles and the
    /// options ask for it to be dropped.
    pub fn resolve(
        &self,
        name: &str,
        explicit: Option<&str>,
        requested_by: &str,
        options: &ResolveOptions,
    ) -> LockgraphResult<Option<(&str, &str)>> {
        let Some(locked) = self.by_name.get(&normalize_name(name)) else {
            return dangling(name, explicit.unwrap_or("*"), requested_by, options);
        };

        let version = match explicit {
            Some(version) => match locked.versions.get(version) {
                Some(version) => version,
                None => return dangling(name, version, requested_by, options),
            },
            None => {
                let mut pinned = locked.versions.iter();
                match (pinned.next(), pinned.next()) {
                    (Some(version), None) => version,
                    _ => {
                        return Err(LockgraphError::UnresolvedVersion {
                            name: locked.name.clone(),
                            versions: locked.versions.iter().cloned().collect(),
                            requested_by: requested_by.to_string(),
                        })
                    }
                }
            }
        };
        Ok(Some((locked.name.as_str(), version.as_str())))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn dangling<'a>(
    name: &str,
    version: &str,
    requested_by: &str,
    options: &ResolveOptions,
) -> LockgraphResult<Option<(&'a str, &'a str)>> {
    if options.is_lenient() {
        tracing::warn!("Dropping dangling reference {name}=={version} from {requested_by}");
        return Ok(None);
    }
    Err(LockgraphError::DanglingReference {
        name: name.to_string(),
        version: version.to_string(),
        requested_by: requested_by.to_string(),
    })
}
