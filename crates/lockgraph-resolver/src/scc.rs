//! Strongly connected components of the marker graph.
//!
//! Each component becomes one build unit downstream. Components are found
//! with Kosaraju's two passes, both driven by petgraph's iterative walkers so
//! deep graphs never touch the call stack:
//! 1. Post-order over the forward graph to get finishing order
//! 2. Walks over the transposed graph in reverse finishing order; each walk
//!    from an undiscovered node yields one component
//!
//! A component's id is a digest of its sorted members, so it survives
//! lockfile reordering.

use std::collections::BTreeMap;

use lockgraph_util::hash::short_digest;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, DfsPostOrder, EdgeRef, Reversed, VisitMap};
use serde::Serialize;

use crate::graph::{MarkerGraph, MarkerSet, NodeKey};

/// Hex digits kept from the member digest.
const SCC_ID_LEN: usize = 16;

/// Content-derived component identifier.
pub type SccId = String;

/// The component decomposition of a marker graph.
#[derive(Debug, Default, Serialize)]
pub struct SccIndex {
    /// Component id to sorted members.
    members: BTreeMap<SccId, Vec<NodeKey>>,
    /// Node to owning component.
    owners: BTreeMap<NodeKey, SccId>,
    /// Component id to edges leaving the component.
    external: BTreeMap<SccId, BTreeMap<NodeKey, MarkerSet>>,
    /// Components with a real cycle (several members or a self-loop).
    cyclic: Vec<SccId>,
}

impl SccIndex {
    pub fn members(&self, id: &str) -> Option<&[NodeKey]> {
        self.members.get(id).map(Vec::as_slice)
    }

    pub fn owner(&self, key: &NodeKey) -> Option<&SccId> {
        self.owners.get(key)
    }

    /// Dependencies of the component on nodes outside it, markers preserved.
    pub fn external_deps(&self, id: &str) -> Option<&BTreeMap<NodeKey, MarkerSet>> {
        self.external.get(id)
    }

    /// Component ids with their members, ordered by id.
    pub fn components(&self) -> impl Iterator<Item = (&SccId, &[NodeKey])> {
        self.members.iter().map(|(id, m)| (id, m.as_slice()))
    }

    /// Ids of components that contain a dependency cycle.
    pub fn cycles(&self) -> &[SccId] {
        &self.cyclic
    }

    pub fn is_cyclic(&self, id: &str) -> bool {
        self.cyclic.iter().any(|c| c == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Deterministic id of a component with the given members.
pub fn scc_id(members: &[NodeKey]) -> SccId {
    let mut canonical: Vec<String> = members.iter().map(NodeKey::canonical).collect();
    canonical.sort();
    short_digest(canonical.join("\n").as_bytes(), SCC_ID_LEN)
}

/// Collapse the graph into components and compute their external edges.
pub fn collapse(graph: &MarkerGraph) -> SccIndex {
    let inner = graph.inner();
    let mut index = SccIndex::default();

    for component in kosaraju(inner) {
        let mut members: Vec<NodeKey> = component.iter().map(|&n| inner[n].clone()).collect();
        members.sort();
        let id = scc_id(&members);
        let self_loop = component.len() == 1 && inner.find_edge(component[0], component[0]).is_some();
        if members.len() > 1 || self_loop {
            index.cyclic.push(id.clone());
        }
        for member in &members {
            index.owners.insert(member.clone(), id.clone());
        }
        index.members.insert(id, members);
    }

    for (id, members) in &index.members {
        let mut deps: BTreeMap<NodeKey, MarkerSet> = BTreeMap::new();
        for member in members {
            let Some(from) = graph.find(member) else {
                continue;
            };
            for edge in inner.edges(from) {
                let target = &inner[edge.target()];
                if index.owners.get(target) != Some(id) {
                    deps.entry(target.clone()).or_default().union(edge.weight());
                }
            }
        }
        index.external.insert(id.clone(), deps);
    }
    index.cyclic.sort();

    tracing::debug!(
        components = index.len(),
        cycles = index.cyclic.len(),
        "Collapsed strongly connected components"
    );
    index
}

fn kosaraju<N, E>(graph: &DiGraph<N, E>) -> Vec<Vec<NodeIndex>> {
    let mut finish_order = Vec::with_capacity(graph.node_count());
    let mut forward = DfsPostOrder::empty(graph);
    for start in graph.node_indices() {
        if forward.discovered.is_visited(&start) {
            continue;
        }
        forward.move_to(start);
        while let Some(node) = forward.next(graph) {
            finish_order.push(node);
        }
    }

    let transposed = Reversed(graph);
    let mut backward = Dfs::empty(transposed);
    let mut components = Vec::new();
    for &start in finish_order.iter().rev() {
        if backward.discovered.is_visited(&start) {
            continue;
        }
        backward.move_to(start);
        let mut component = Vec::new();
        while let Some(node) = backward.next(transposed) {
            component.push(node);
        }
        components.push(component);
    }
    components
}
