//! Configuration activation: which nodes each configuration reaches, and
//! through which edges.
//!
//! Every marker is assumed live, so the result is a conservative superset of
//! what any single environment installs.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use lockgraph_core::config::ResolveOptions;
use lockgraph_util::errors::{LockgraphError, LockgraphResult};
use serde::Serialize;

use crate::graph::{MarkerGraph, MarkerSet, NodeKey};
use crate::requirement::parse_requirement_pairs;
use crate::versions::PackageVersions;

/// Why a node is active: a root requirement, or an edge from another node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Origin {
    Root,
    Node(NodeKey),
}

/// The reach set of one configuration with the incoming edges of every node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigActivation {
    incoming: BTreeMap<NodeKey, BTreeMap<Origin, MarkerSet>>,
}

impl ConfigActivation {
    fn record(&mut self, node: NodeKey, origin: Origin, markers: &MarkerSet) {
        self.incoming
            .entry(node)
            .or_default()
            .entry(origin)
            .or_default()
            .union(markers);
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.incoming.contains_key(key)
    }

    /// Reached nodes, sorted.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeKey> {
        self.incoming.keys()
    }

    /// The origins that activate `key`, each with the markers of that edge.
    pub fn incoming(&self, key: &NodeKey) -> Option<&BTreeMap<Origin, MarkerSet>> {
        self.incoming.get(key)
    }

    /// Every reached node with its incoming edges.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &BTreeMap<Origin, MarkerSet>)> {
        self.incoming.iter()
    }

    /// Union of the markers on every edge into `key`.
    pub fn markers(&self, key: &NodeKey) -> MarkerSet {
        let mut markers = MarkerSet::default();
        for edge in self.incoming.get(key).into_iter().flat_map(BTreeMap::values) {
            markers.union(edge);
        }
        markers
    }

    /// A shortest chain from a root requirement to `key`, root first.
    pub fn why(&self, key: &NodeKey) -> Option<Vec<NodeKey>> {
        // Walk incoming edges backwards; `toward` points one step closer to `key`.
        let mut toward: HashMap<&NodeKey, Option<&NodeKey>> = HashMap::new();
        let (key, _) = self.incoming.get_key_value(key)?;
        toward.insert(key, None);
        let mut queue = VecDeque::from([key]);

        while let Some(current) = queue.pop_front() {
            let origins = self.incoming.get(current)?;
            if origins.contains_key(&Origin::Root) {
                let mut path = vec![current.clone()];
                let mut at = current;
                while let Some(Some(next)) = toward.get(at) {
                    path.push((*next).clone());
                    at = *next;
                }
                return Some(path);
            }
            for origin in origins.keys() {
                if let Origin::Node(parent) = origin {
                    if let Some((parent, _)) = self.incoming.get_key_value(parent) {
                        if !toward.contains_key(parent) {
                            toward.insert(parent, Some(current));
                            queue.push_back(parent);
                        }
                    }
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.incoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty()
    }
}

/// The activation of every configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Activation {
    configurations: BTreeMap<String, ConfigActivation>,
}

impl Activation {
    pub fn get(&self, configuration: &str) -> Option<&ConfigActivation> {
        self.configurations.get(configuration)
    }

    pub fn configuration_names(&self) -> impl Iterator<Item = &str> {
        self.configurations.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigActivation)> {
        self.configurations.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Compute the activation of each configuration from its root requirements.
pub fn activate(
    graph: &MarkerGraph,
    versions: &PackageVersions,
    configurations: &BTreeMap<String, Vec<String>>,
    options: &ResolveOptions,
) -> LockgraphResult<Activation> {
    let mut activation = Activation::default();
    for (name, roots) in configurations {
        let reached = activate_configuration(graph, versions, name, roots, options)?;
        tracing::debug!(configuration = %name, nodes = reached.len(), "Activated configuration");
        activation.configurations.insert(name.clone(), reached);
    }
    Ok(activation)
}

/// Worklist traversal for a single configuration.
///
/// Each node is enqueued once; every edge leaving a processed node is
/// recorded, so the incoming sets see all paths and not only the first.
pub fn activate_configuration(
    graph: &MarkerGraph,
    versions: &PackageVersions,
    configuration: &str,
    roots: &[String],
    options: &ResolveOptions,
) -> LockgraphResult<ConfigActivation> {
    let mut reached = ConfigActivation::default();
    let mut queue: VecDeque<NodeKey> = VecDeque::new();
    let mut visited: HashSet<NodeKey> = HashSet::new();
    let requested_by = format!("configuration `{configuration}`");

    for root in roots {
        for (key, marker) in parse_requirement_pairs(root)? {
            let Some((name, version)) = versions.resolve(&key.name, None, &requested_by, options)?
            else {
                continue;
            };
            let node = NodeKey::new(name, version, &key.extra);
            reached.record(node.clone(), Origin::Root, &MarkerSet::from_marker(marker.as_deref()));
            if visited.insert(node.clone()) {
                queue.push_back(node);
            }
        }
    }

    let bound = options
        .step_limit
        .unwrap_or_else(|| (graph.node_count() + queue.len() + 1).saturating_pow(2));
    let mut steps = 0usize;

    while let Some(current) = queue.pop_front() {
        steps += 1;
        if steps > bound {
            return Err(LockgraphError::ResolutionDivergence {
                configuration: configuration.to_string(),
                bound,
            });
        }

        let Some(idx) = graph.find(&current) else {
            continue;
        };
        for (next_idx, markers) in graph.dependencies_of(idx) {
            let next = graph.node(next_idx);
            reached.record(next.clone(), Origin::Node(current.clone()), markers);
            if visited.insert(next.clone()) {
                queue.push_back(next.clone());
            }
        }
    }

    Ok(reached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_marker_graph;
    use lockgraph_core::lockfile::{LockedDependency, LockedPackage, Lockfile};
    use lockgraph_core::BASE_EXTRA;

    fn pkg(name: &str, version: &str, deps: Vec<LockedDependency>) -> LockedPackage {
        LockedPackage {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: deps,
            optional_dependencies: BTreeMap::new(),
        }
    }

    fn run(
        lock: &Lockfile,
        roots: &[&str],
        options: &ResolveOptions,
    ) -> LockgraphResult<ConfigActivation> {
        let versions = PackageVersions::from_lockfile(lock);
        let graph = build_marker_graph(lock, &versions, options)?;
        let roots: Vec<String> = roots.iter().map(|r| r.to_string()).collect();
        activate_configuration(&graph, &versions, "default", &roots, options)
    }

    fn diamond() -> Lockfile {
        Lockfile {
            package: vec![
                pkg(
                    "top",
                    "1",
                    vec![
                        LockedDependency::on("left").marker("os_name == 'nt'"),
                        LockedDependency::on("right"),
                    ],
                ),
                pkg("left", "1", vec![LockedDependency::on("bottom").marker("python_version < '3.10'")]),
                pkg("right", "1", vec![LockedDependency::on("bottom")]),
                pkg("bottom", "1", vec![]),
                pkg("unused", "1", vec![]),
            ],
        }
    }

    #[test]
    fn reaches_transitive_deps_only() {
        let reached = run(&diamond(), &["top"], &ResolveOptions::default()).unwrap();
        let names: Vec<&str> = reached.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["bottom", "left", "right", "top"]);
    }

    #[test]
    fn records_every_incoming_edge() {
        let reached = run(&diamond(), &["top"], &ResolveOptions::default()).unwrap();
        let bottom = NodeKey::base("bottom", "1");
        let incoming = reached.incoming(&bottom).unwrap();
        assert_eq!(incoming.len(), 2);
        assert!(incoming[&Origin::Node(NodeKey::base("right", "1"))].is_unconditional());
        assert!(reached.markers(&bottom).is_unconditional());
        assert_eq!(
            reached.markers(&NodeKey::base("left", "1")).expression().as_deref(),
            Some("os_name == 'nt'")
        );
    }

    #[test]
    fn root_marker_is_recorded() {
        let reached = run(&diamond(), &["top ; sys_platform == 'win32'"], &ResolveOptions::default())
            .unwrap();
        let top = NodeKey::base("top", "1");
        assert_eq!(
            reached.incoming(&top).unwrap()[&Origin::Root].expression().as_deref(),
            Some("sys_platform == 'win32'")
        );
    }

    #[test]
    fn root_extra_activates_base() {
        let mut foo = pkg("foo", "1", vec![]);
        foo.optional_dependencies
            .insert("cli".to_string(), vec![LockedDependency::on("click")]);
        let lock = Lockfile {
            package: vec![foo, pkg("click", "8", vec![])],
        };
        let reached = run(&lock, &["foo[cli]"], &ResolveOptions::default()).unwrap();
        assert!(reached.contains(&NodeKey::new("foo", "1", "cli")));
        assert!(reached.contains(&NodeKey::new("foo", "1", BASE_EXTRA)));
        assert!(reached.contains(&NodeKey::base("click", "8")));

        let plain = run(&lock, &["foo"], &ResolveOptions::default()).unwrap();
        assert!(!plain.contains(&NodeKey::new("foo", "1", "cli")));
        assert!(!plain.contains(&NodeKey::base("click", "8")));
    }

    #[test]
    fn cycle_terminates() {
        let lock = Lockfile {
            package: vec![
                pkg("a", "1", vec![LockedDependency::on("b")]),
                pkg("b", "1", vec![LockedDependency::on("a")]),
            ],
        };
        let reached = run(&lock, &["a"], &ResolveOptions::default()).unwrap();
        assert_eq!(reached.len(), 2);
        assert!(reached
            .incoming(&NodeKey::base("a", "1"))
            .unwrap()
            .contains_key(&Origin::Node(NodeKey::base("b", "1"))));
    }

    #[test]
    fn exceeding_step_limit_diverges() {
        let options = ResolveOptions::default().with_step_limit(2);
        let err = run(&diamond(), &["top"], &options).unwrap_err();
        assert!(
            matches!(err, LockgraphError::ResolutionDivergence { bound: 2, .. }),
            "got: {err}"
        );
    }

    #[test]
    fn ambiguous_root_fails() {
        let lock = Lockfile {
            package: vec![pkg("lib", "1", vec![]), pkg("lib", "2", vec![])],
        };
        let err = run(&lock, &["lib"], &ResolveOptions::lenient()).unwrap_err();
        assert!(matches!(err, LockgraphError::UnresolvedVersion { .. }));
    }

    #[test]
    fn unknown_root_by_policy() {
        let lock = diamond();
        let err = run(&lock, &["ghost"], &ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, LockgraphError::DanglingReference { .. }));

        let reached = run(&lock, &["ghost", "right"], &ResolveOptions::lenient()).unwrap();
        assert_eq!(reached.len(), 2);
    }

    #[test]
    fn why_returns_shortest_chain() {
        let reached = run(&diamond(), &["top"], &ResolveOptions::default()).unwrap();
        let path = reached.why(&NodeKey::base("bottom", "1")).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], NodeKey::base("top", "1"));
        assert_eq!(path[2], NodeKey::base("bottom", "1"));
        assert!(reached.why(&NodeKey::base("unused", "1")).is_none());
    }

    #[test]
    fn why_of_root_is_itself() {
        let reached = run(&diamond(), &["top"], &ResolveOptions::default()).unwrap();
        let top = NodeKey::base("top", "1");
        assert_eq!(reached.why(&top), Some(vec![top]));
    }
}
