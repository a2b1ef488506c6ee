//! Action abstraction module
//!
//! This module defines the plugin-facing contract:
//! - Action: the two-method step interface a work item is driven through
//! - ActionResult: success/failure value recorded on the task
//! - StepContext: per-step view handed to `first`/`next`
//! - ActionContext: construction-time capabilities (clock, shutdown, config)
//! - ActionFactory: host-supplied constructor from plugin name to Action

mod context;
mod result;

use serde_json::Value;
use thiserror::Error;

pub use context::ActionContext;
pub use result::{ActionResult, INTERNAL_ERROR};

use crate::types::TaskDescription;

/// One unit of administrative work, driven step by step.
///
/// The dispatcher calls `first` exactly once (while the task's progress is
/// still 0) and `next` on every later step. Both return `true` when more
/// work remains and `false` when the task is finished. A step may mark
/// failure through [`StepContext::fail`]; a non-ok result is terminal even
/// when the step returned `true`.
///
/// Steps for one task never run concurrently, but consecutive steps may run
/// on different worker threads. Implementations are expected to keep
/// individual steps short and to poll
/// [`shutdown_requested`](ActionContext::shutdown_requested) between steps.
pub trait Action: Send {
    fn first(&mut self, step: &mut StepContext<'_>) -> bool;

    fn next(&mut self, step: &mut StepContext<'_>) -> bool;
}

/// Per-step view of a task, handed to `first`/`next`.
///
/// Carries the progress counter, the mutable result slot, and the
/// capability context the action was built with.
pub struct StepContext<'a> {
    progress: u64,
    result: ActionResult,
    context: &'a ActionContext,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(progress: u64, result: ActionResult, context: &'a ActionContext) -> Self {
        Self {
            progress,
            result,
            context,
        }
    }

    /// Number of completed steps so far; 0 inside `first`.
    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn result(&self) -> &ActionResult {
        &self.result
    }

    /// Record a failure code; the task transitions to FAILED after this step.
    pub fn fail(&mut self, code: i32, message: impl Into<String>) {
        self.result = ActionResult::new(code, message);
    }

    pub fn set_result(&mut self, result: ActionResult) {
        self.result = result;
    }

    pub fn context(&self) -> &ActionContext {
        self.context
    }

    pub(crate) fn into_result(self) -> ActionResult {
        self.result
    }
}

/// Factory errors, surfaced to admitters as `BadParameter`.
#[derive(Debug, Error)]
pub enum ActionBuildError {
    #[error("unknown action name: {0}")]
    UnknownName(String),

    #[error("invalid description for '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Host-supplied constructor from plugin name to a concrete [`Action`].
///
/// Called with the registry lock held: implementations must not block on
/// other maintenance operations and should do no more than parameter
/// parsing and object construction.
pub trait ActionFactory: Send + Sync {
    fn build(
        &self,
        name: &str,
        description: &TaskDescription,
        properties: &Value,
        ctx: &ActionContext,
    ) -> Result<Box<dyn Action>, ActionBuildError>;
}
