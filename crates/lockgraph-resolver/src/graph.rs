//! Marker graph construction: `(name, version, extra)` nodes joined by edges
//! labelled with the environment markers that gate them.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use lockgraph_core::config::ResolveOptions;
use lockgraph_core::lockfile::{LockedDependency, Lockfile};
use lockgraph_core::BASE_EXTRA;
use lockgraph_util::errors::LockgraphResult;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::versions::PackageVersions;

/// A node in the marker graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeKey {
    pub name: String,
    pub version: String,
    /// [`BASE_EXTRA`] for the unconditional install, otherwise an extra name.
    pub extra: String,
}

impl NodeKey {
    pub fn new(name: &str, version: &str, extra: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            extra: extra.to_string(),
        }
    }

    /// The unconditional install of `name==version`.
    pub fn base(name: &str, version: &str) -> Self {
        Self::new(name, version, BASE_EXTRA)
    }

    pub fn is_base(&self) -> bool {
        self.extra == BASE_EXTRA
    }

    /// The base node of the same package version.
    pub fn to_base(&self) -> Self {
        Self::base(&self.name, &self.version)
    }

    /// Unambiguous `name==version[extra]` form used for digests.
    pub fn canonical(&self) -> String {
        format!("{}=={}[{}]", self.name, self.version, self.extra)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_base() {
            write!(f, "{}=={}", self.name, self.version)
        } else {
            write!(f, "{}[{}]=={}", self.name, self.extra, self.version)
        }
    }
}

/// The markers under which an edge (or an activation) holds.
///
/// `unconditional` records that at least one contributing declaration had no
/// marker at all; it dominates every expression when rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkerSet {
    unconditional: bool,
    exprs: BTreeSet<String>,
}

impl MarkerSet {
    pub fn unconditional() -> Self {
        Self {
            unconditional: true,
            exprs: BTreeSet::new(),
        }
    }

    pub fn when(expr: &str) -> Self {
        Self {
            unconditional: false,
            exprs: BTreeSet::from([expr.to_string()]),
        }
    }

    /// `None` is the "no marker" sentinel.
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some(expr) => Self::when(expr),
            None => Self::unconditional(),
        }
    }

    pub fn insert(&mut self, marker: Option<&str>) {
        match marker {
            Some(expr) => {
                self.exprs.insert(expr.to_string());
            }
            None => self.unconditional = true,
        }
    }

    pub fn union(&mut self, other: &MarkerSet) {
        self.unconditional |= other.unconditional;
        self.exprs.extend(other.exprs.iter().cloned());
    }

    pub fn is_unconditional(&self) -> bool {
        self.unconditional
    }

    pub fn is_empty(&self) -> bool {
        !self.unconditional && self.exprs.is_empty()
    }

    pub fn exprs(&self) -> impl Iterator<Item = &str> {
        self.exprs.iter().map(String::as_str)
    }

    /// The combined marker expression, or `None` when the set always holds.
    ///
    /// Several expressions are parenthesized and joined with `or`.
    pub fn expression(&self) -> Option<String> {
        if self.unconditional || self.exprs.is_empty() {
            return None;
        }
        if self.exprs.len() == 1 {
            return self.exprs.iter().next().cloned();
        }
        let parts: Vec<String> = self.exprs.iter().map(|e| format!("({e})")).collect();
        Some(parts.join(" or "))
    }
}

/// The dependency graph of a lockfile, backed by petgraph.
///
/// Parallel edges never exist: adding an edge between an already connected
/// pair unions the marker sets.
#[derive(Debug, Default)]
pub struct MarkerGraph {
    graph: DiGraph<NodeKey, MarkerSet>,
    index: HashMap<NodeKey, NodeIndex>,
}

impl MarkerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or retrieve a node. If the key already exists, returns the existing index.
    pub fn add_node(&mut self, key: NodeKey) -> NodeIndex {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(key.clone());
        self.index.insert(key, idx);
        idx
    }

    /// Add a node, wiring extras to their base with an unconditional edge.
    pub fn add_package_node(&mut self, key: NodeKey) -> NodeIndex {
        if key.is_base() {
            return self.add_node(key);
        }
        let base = self.add_node(key.to_base());
        let idx = self.add_node(key);
        self.add_edge(idx, base, &MarkerSet::unconditional());
        idx
    }

    /// Add a dependency edge from `from` to `to`, merging markers into any existing edge.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, markers: &MarkerSet) {
        match self.graph.find_edge(from, to) {
            Some(edge) => self.graph[edge].union(markers),
            None => {
                self.graph.add_edge(from, to, markers.clone());
            }
        }
    }

    /// Look up a node by key.
    pub fn find(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    /// Get the node key for an index.
    pub fn node(&self, idx: NodeIndex) -> &NodeKey {
        &self.graph[idx]
    }

    /// All node keys, sorted.
    pub fn nodes(&self) -> Vec<&NodeKey> {
        let mut nodes: Vec<&NodeKey> = self.graph.node_weights().collect();
        nodes.sort();
        nodes
    }

    /// Direct dependencies of a node with the markers of each edge.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &MarkerSet)> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect()
    }

    /// The markers on the edge `from -> to`, if connected.
    pub fn edge_markers(&self, from: &NodeKey, to: &NodeKey) -> Option<&MarkerSet> {
        let edge = self.graph.find_edge(self.find(from)?, self.find(to)?)?;
        self.graph.edge_weight(edge)
    }

    pub(crate) fn inner(&self) -> &DiGraph<NodeKey, MarkerSet> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// Build the marker graph of a lockfile.
///
/// Every package contributes its base node. Plain dependencies hang off the
/// base; each optional-dependency group becomes an extra node that depends on
/// the base and on the group's dependencies.
pub fn build_marker_graph(
    lockfile: &Lockfile,
    versions: &PackageVersions,
    options: &ResolveOptions,
) -> LockgraphResult<MarkerGraph> {
    let mut graph = MarkerGraph::new();

    for pkg in &lockfile.package {
        let base_key = NodeKey::base(&pkg.name, &pkg.version);
        let base = graph.add_node(base_key.clone());
        for dep in &pkg.dependencies {
            add_dependency(&mut graph, base, &base_key, dep, versions, options)?;
        }

        for (extra, deps) in &pkg.optional_dependencies {
            let extra_key = NodeKey::new(&pkg.name, &pkg.version, extra);
            let from = graph.add_package_node(extra_key.clone());
            for dep in deps {
                add_dependency(&mut graph, from, &extra_key, dep, versions, options)?;
            }
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Built marker graph"
    );
    Ok(graph)
}

fn add_dependency(
    graph: &mut MarkerGraph,
    from: NodeIndex,
    from_key: &NodeKey,
    dep: &LockedDependency,
    versions: &PackageVersions,
    options: &ResolveOptions,
) -> LockgraphResult<()> {
    let requested_by = from_key.to_string();
    let Some((name, version)) =
        versions.resolve(&dep.name, dep.version.as_deref(), &requested_by, options)?
    else {
        return Ok(());
    };

    let markers = MarkerSet::from_marker(dep.marker_expr());
    for extra in dep.target_extras() {
        let to = graph.add_package_node(NodeKey::new(name, version, extra));
        graph.add_edge(from, to, &markers);
    }
    Ok(())
}
