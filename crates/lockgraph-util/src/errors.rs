use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all lockgraph operations.
#[derive(Debug, Error, Diagnostic)]
pub enum LockgraphError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lockfile or project file could not be deserialized.
    #[error("Parse error: {message}")]
    #[diagnostic(code(lockgraph::parse), help("Check the file for TOML syntax errors"))]
    Parse { message: String },

    /// The project manifest is structurally unusable (no configurations,
    /// unknown or cyclic group includes).
    #[error("Invalid project: {message}")]
    #[diagnostic(code(lockgraph::project))]
    InvalidProject { message: String },

    /// A dependency omitted its version but the target is locked at several.
    #[error("Cannot pick a default version of `{name}` (locked at {}) required by {requested_by}", .versions.join(", "))]
    #[diagnostic(
        code(lockgraph::unresolved_version),
        help("Pin the dependency to one of the locked versions")
    )]
    UnresolvedVersion {
        name: String,
        versions: Vec<String>,
        requested_by: String,
    },

    /// A dependency names a package/version pair the lockfile does not declare.
    #[error("`{name}=={version}` required by {requested_by} is not in the lockfile")]
    #[diagnostic(
        code(lockgraph::dangling_reference),
        help("Re-lock the project, or resolve in lenient mode to drop dangling edges")
    )]
    DanglingReference {
        name: String,
        version: String,
        requested_by: String,
    },

    /// A requirement string has no identifiable package name.
    #[error("Malformed requirement `{requirement}`: {reason}")]
    #[diagnostic(code(lockgraph::malformed_requirement))]
    MalformedRequirement { requirement: String, reason: String },

    /// The activation traversal exceeded its step bound. This indicates a bug
    /// in graph construction, never a property of the input.
    #[error("Resolution of configuration `{configuration}` exceeded {bound} steps")]
    #[diagnostic(code(lockgraph::divergence))]
    ResolutionDivergence { configuration: String, bound: usize },
}

/// Convenience alias for results carrying a [`LockgraphError`].
pub type LockgraphResult<T> = Result<T, LockgraphError>;
