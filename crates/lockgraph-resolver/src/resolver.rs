//! End-to-end resolution: lockfile and configurations in, every derived
//! artifact out.

use std::collections::{BTreeMap, BTreeSet};

use lockgraph_core::config::ResolveOptions;
use lockgraph_core::lockfile::Lockfile;
use lockgraph_core::project::ProjectSpec;
use lockgraph_util::errors::LockgraphResult;

use crate::activation::{activate, Activation};
use crate::collate::{
    activated_sccs, collate_versions_by_name, collect_markers, render_requirements, Collation,
};
use crate::graph::{build_marker_graph, MarkerGraph};
use crate::scc::{collapse, SccId, SccIndex};
use crate::versions::PackageVersions;

/// The output of one resolution pass.
#[derive(Debug)]
pub struct Resolution {
    pub package_versions: PackageVersions,
    pub graph: MarkerGraph,
    pub sccs: SccIndex,
    pub activation: Activation,
    pub collation: Collation,
    /// Marker expression to short digest.
    pub markers: BTreeMap<String, String>,
}

impl Resolution {
    /// Pinned requirement text for `configuration`, or `None` if no such
    /// configuration was resolved.
    pub fn export(&self, configuration: &str) -> Option<String> {
        self.activation.get(configuration)?;
        Some(render_requirements(&self.collation, configuration))
    }

    /// Name to version for every package locked at exactly one version.
    pub fn default_versions(&self) -> BTreeMap<String, String> {
        self.package_versions.default_versions()
    }

    pub fn configuration_names(&self) -> impl Iterator<Item = &str> {
        self.activation.configuration_names()
    }

    /// Components reached by `configuration`.
    pub fn activated_sccs(&self, configuration: &str) -> Option<BTreeSet<SccId>> {
        self.activation
            .get(configuration)
            .map(|reached| activated_sccs(reached, &self.sccs))
    }
}

/// Resolve the configurations declared by `project`.
///
/// The `[tool.lockgraph]` options of the project are used only when the
/// caller passes `None`.
pub fn resolve(
    project: &ProjectSpec,
    lockfile: &Lockfile,
    options: Option<&ResolveOptions>,
) -> LockgraphResult<Resolution> {
    let configurations = project.configurations()?;
    let options = options.unwrap_or_else(|| project.resolve_options());
    resolve_configurations(&configurations, lockfile, options)
}

/// Resolve explicit configurations against `lockfile`.
pub fn resolve_configurations(
    configurations: &BTreeMap<String, Vec<String>>,
    lockfile: &Lockfile,
    options: &ResolveOptions,
) -> LockgraphResult<Resolution> {
    let package_versions = PackageVersions::from_lockfile(lockfile);
    let graph = build_marker_graph(lockfile, &package_versions, options)?;
    let sccs = collapse(&graph);
    let activation = activate(&graph, &package_versions, configurations, options)?;
    let collation = collate_versions_by_name(&activation);
    let markers = collect_markers(&graph);

    tracing::debug!(
        packages = package_versions.len(),
        nodes = graph.node_count(),
        components = sccs.len(),
        configurations = configurations.len(),
        "Resolved lockfile"
    );

    Ok(Resolution {
        package_versions,
        graph,
        sccs,
        activation,
        collation,
        markers,
    })
}
