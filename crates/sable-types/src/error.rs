//! Error types shared across all Sable crates.

/// Errors that can occur across the Sable host.
///
/// Each variant corresponds to a different subsystem: module graph, command
/// dispatch, permission resolution, persistence, or configuration. Module
/// errors are per-module and never fatal to the host; dispatch errors are
/// rendered back to the channel as error alerts.
#[derive(Debug, thiserror::Error)]
pub enum SableError {
    /// A module descriptor is malformed, missing, or fails validation.
    #[error("invalid module descriptor: {0}")]
    InvalidModule(String),

    /// A module names a dependency that is not indexed or failed to load.
    #[error("module '{module}' is missing dependency '{missing}'")]
    MissingDependency { module: String, missing: String },

    /// The module dependency graph contains a cycle.
    #[error("cyclic module dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A module's constructor or lifecycle hook failed.
    #[error("module '{module}' failed to load: {reason}")]
    ModuleLoad { module: String, reason: String },

    /// A command was registered with an invalid shape (bad argument layout,
    /// empty name, duplicate child).
    #[error("invalid command definition: {0}")]
    InvalidCommand(String),

    /// A required argument was not supplied. Carries the argument name.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// The input contained an unterminated quoted token.
    #[error("unterminated quote in command input")]
    UnterminatedQuote,

    /// The actor is not allowed to perform the guarded action.
    #[error("permission denied for node '{node}'")]
    PermissionDenied { node: String },

    /// A permission node string is not a valid dot-delimited path.
    #[error("invalid permission node '{0}'")]
    InvalidNode(String),

    /// The persistence adapter failed; surfaced as a generic failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The gateway failed to deliver or delete a message.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}
