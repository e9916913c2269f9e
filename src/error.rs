//! The recoverable, caller-visible half of the error taxonomy.
//!
//! Everything in the "recovered locally" class (duplicate ids, double-disconnect, stale
//! relationship targets) is handled silently at the call site and never reaches here.
//! The "programming error" class (debugger-assertion style) stays as `debug_assert!`
//! and is never surfaced as a `Result`.

use thiserror::Error;

/// Errors a [`World`](crate::world::World) operation can hand back to its caller.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("system {0:?} is already registered and was not added with replace semantics")]
    DuplicateSystem(String),

    #[error("observer {0:?} is already registered")]
    DuplicateObserver(String),

    #[error("dependency cycle detected among systems in group {group:?}: {cycle:?}")]
    DependencyCycle { group: String, cycle: Vec<String> },

    #[error("system {system:?} declares a dependency on unknown system {dependency:?}")]
    UnknownDependency { system: String, dependency: String },

    #[error("no system group named {0:?}")]
    UnknownGroup(String),
}

pub type WorldResult<T> = Result<T, WorldError>;
