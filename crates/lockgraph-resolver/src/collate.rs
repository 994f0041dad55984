//! Collation of activations by package name, and requirement-list export.

use std::collections::{BTreeMap, BTreeSet};

use lockgraph_util::hash::short_digest;
use serde::Serialize;

use crate::activation::{Activation, ConfigActivation};
use crate::graph::{MarkerGraph, MarkerSet};
use crate::scc::{SccId, SccIndex};

/// Hex digits kept from a marker digest.
const MARKER_ID_LEN: usize = 16;

/// Version to the union of markers activating it.
pub type VersionMarkers = BTreeMap<String, MarkerSet>;

/// Package name to configuration to activated versions.
///
/// All extras of one version fold into that version's marker set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Collation {
    by_name: BTreeMap<String, BTreeMap<String, VersionMarkers>>,
}

impl Collation {
    /// Configurations a package appears in, with its versions in each.
    pub fn package(&self, name: &str) -> Option<&BTreeMap<String, VersionMarkers>> {
        self.by_name.get(name)
    }

    /// `(name, version, markers)` for every package active in `configuration`,
    /// sorted by name then version.
    pub fn entries<'a>(
        &'a self,
        configuration: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str, &'a MarkerSet)> + 'a {
        self.by_name.iter().flat_map(move |(name, cfgs)| {
            cfgs.get(configuration)
                .into_iter()
                .flat_map(move |versions| {
                    versions
                        .iter()
                        .map(move |(version, markers)| (name.as_str(), version.as_str(), markers))
                })
        })
    }

    /// JSON form for build-file generators.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Regroup every configuration's activation by package name.
pub fn collate_versions_by_name(activation: &Activation) -> Collation {
    let mut collation = Collation::default();
    for (configuration, reached) in activation.iter() {
        for (node, incoming) in reached.iter() {
            let markers = collation
                .by_name
                .entry(node.name.clone())
                .or_default()
                .entry(configuration.to_string())
                .or_default()
                .entry(node.version.clone())
                .or_default();
            for edge in incoming.values() {
                markers.union(edge);
            }
        }
    }
    collation
}

/// Render `configuration` as pinned requirement lines.
///
/// Lines are `name==version`, followed by ` ; <marker>` unless some path to
/// that version is unconditional.
pub fn render_requirements(collation: &Collation, configuration: &str) -> String {
    let lines: Vec<String> = collation
        .entries(configuration)
        .map(|(name, version, markers)| match markers.expression() {
            Some(expr) => format!("{name}=={version} ; {expr}"),
            None => format!("{name}=={version}"),
        })
        .collect();
    lines.join("\n")
}

/// Every marker expression in the graph with a short digest, for naming
/// marker-gated targets.
pub fn collect_markers(graph: &MarkerGraph) -> BTreeMap<String, String> {
    let mut markers = BTreeMap::new();
    for expr in graph.inner().edge_weights().flat_map(|m| m.exprs()) {
        if !markers.contains_key(expr) {
            markers.insert(expr.to_string(), short_digest(expr.as_bytes(), MARKER_ID_LEN));
        }
    }
    markers
}

/// The components touched by a configuration.
pub fn activated_sccs(reached: &ConfigActivation, sccs: &SccIndex) -> BTreeSet<SccId> {
    reached
        .nodes()
        .filter_map(|node| sccs.owner(node).cloned())
        .collect()
}
