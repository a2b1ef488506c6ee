//! # Upkeep Core
//!
//! In-process scheduler for idempotent administrative work ("maintenance
//! tasks").
//!
//! This crate contains:
//! - TaskDescription / Task / TaskState definitions
//! - The Action plugin contract (`first`/`next` step functions)
//! - TaskRegistry: dedup, admission ordering, diagnostic snapshots
//! - Dispatcher: a bounded OS-thread worker pool with retry backoff
//! - Runtime: the facade wiring the above to the host lifecycle
//!
//! This crate does NOT care about:
//! - What the administrative work actually is (plugins decide)
//! - How the host parses configuration or command lines
//! - Persistence: all state is process-local and lost on restart

pub mod action;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod runtime;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::{
        Action, ActionBuildError, ActionContext, ActionFactory, ActionResult, StepContext,
        INTERNAL_ERROR,
    };
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::UpkeepError;
    pub use crate::lifecycle::{HostReporter, Lifecycle, ServerPhase};
    pub use crate::registry::TaskRegistry;
    pub use crate::runtime::{Runtime, RuntimeOptions};
    pub use crate::types::{Task, TaskDescription, TaskRecord, TaskState};
}

// Re-export key types at crate root
pub use action::{Action, ActionBuildError, ActionContext, ActionFactory, ActionResult, StepContext};
pub use error::UpkeepError;
pub use lifecycle::{HostReporter, ServerPhase};
pub use registry::TaskRegistry;
pub use runtime::{Runtime, RuntimeOptions};
pub use types::{Task, TaskDescription, TaskRecord, TaskState};
