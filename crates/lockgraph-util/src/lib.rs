//! Shared utilities for lockgraph.
//!
//! This crate provides cross-cutting concerns used by the other lockgraph
//! crates: the error taxonomy and content digests.

pub mod errors;
pub mod hash;
