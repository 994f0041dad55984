//! Lockfile dependency-graph resolution: marker-annotated graph construction,
//! strongly connected component collapsing, per-configuration activation,
//! and collation into pinned requirement lists.

pub mod activation;
pub mod collate;
pub mod graph;
pub mod requirement;
pub mod resolver;
pub mod scc;
pub mod versions;

pub use resolver::{resolve, resolve_configurations, Resolution};
