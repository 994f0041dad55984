//! Core data types for lockgraph.
//!
//! This crate defines the in-memory model the resolver consumes: the locked
//! package set (`uv.lock`), the project manifest (`pyproject.toml`)
//! with its dependency groups, and the options that tune resolution.
//!
//! No resolution logic lives here.

/// The extra name denoting a package's unconditional install.
pub const BASE_EXTRA: &str = "__base__";

/// PEP 503 name normalization: lowercase, with every run of `-`, `_` and `.`
/// collapsed to a single `-`. Applies to package and dependency-group names.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    out
}

pub mod config;
pub mod lockfile;
pub mod project;
