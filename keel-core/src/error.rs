//! Registry error taxonomy.
//!
//! Every condition here is an expected steady-state outcome of the race
//! between the lifecycle feed and concurrent lookups, so none of them aborts
//! the calling flow. Callers decide whether absence is meaningful.

use thiserror::Error;

/// Non-fatal outcomes of registry and endpoint operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No upstream is registered for the application.
    #[error("no upstream for app {0}")]
    UpstreamNotFound(String),

    /// The application has no target with the given task id.
    #[error("no target {task_id} under app {app_id}")]
    TargetNotFound {
        /// Application that was queried.
        app_id: String,
        /// Task id that was absent.
        task_id: String,
    },

    /// A target with the same task id is already registered. The stored entry
    /// wins, which keeps duplicate add notifications idempotent.
    #[error("target {task_id} already registered under app {app_id}")]
    DuplicateTarget {
        /// Application the duplicate was addressed to.
        app_id: String,
        /// Task id that is already present.
        task_id: String,
    },

    /// The supplied target is missing identifying fields.
    #[error("target is missing identifying fields")]
    IncompleteTarget,

    /// The target's IP and port do not compose into a usable address.
    #[error("cannot compose endpoint {address}: {reason}")]
    MalformedEndpoint {
        /// Address that failed to parse.
        address: String,
        /// Parser diagnostic.
        reason: String,
    },
}
