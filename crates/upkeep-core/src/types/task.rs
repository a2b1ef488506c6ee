//! Task: the stateful entity tracked by the registry.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{Action, ActionContext, ActionResult, StepContext};
use crate::types::TaskDescription;

/// Task state machine.
///
/// Wire codes (used in diagnostic snapshots): Ready=1, Executing=2,
/// Waiting=3, Complete=5, Failed=6. Code 4 is intentionally unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Admitted and queued, or between steps with backoff disabled.
    Ready,
    /// A worker is driving a step right now.
    Executing,
    /// Between steps, blocked by the retry-backoff window.
    Waiting,
    /// Finished with a success result. Terminal.
    Complete,
    /// Finished with a failure result. Terminal.
    Failed,
}

impl TaskState {
    pub fn code(&self) -> u8 {
        match self {
            Self::Ready => 1,
            Self::Executing => 2,
            Self::Waiting => 3,
            Self::Complete => 5,
            Self::Failed => 6,
        }
    }

    /// Terminal states are sticky: no transition ever leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Disposition of one driven step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// More work remains; the task must be scheduled again.
    MoreWork,
    /// The task reached a terminal state.
    Finished,
}

/// Mutable task fields, all guarded by one mutex.
struct TaskCell {
    state: TaskState,
    progress: u64,
    result: ActionResult,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
}

/// One admitted unit of administrative work.
///
/// Owned by the registry for the whole process lifetime and observed through
/// `Arc<Task>` handles. All accessors read a consistent snapshot under the
/// internal cell mutex; the plugin step object sits behind a second mutex so
/// at most one step is ever in flight.
pub struct Task {
    id: u64,
    description: Arc<TaskDescription>,
    properties: Value,
    identity: u64,
    created_at: DateTime<Utc>,
    cell: Mutex<TaskCell>,
    step: Mutex<Box<dyn Action>>,
}

impl Task {
    pub(crate) fn new(
        id: u64,
        description: Arc<TaskDescription>,
        properties: Value,
        action: Box<dyn Action>,
    ) -> Self {
        let identity = description.identity_hash();
        Self {
            id,
            description,
            properties,
            identity,
            created_at: Utc::now(),
            cell: Mutex::new(TaskCell {
                state: TaskState::Ready,
                progress: 0,
                result: ActionResult::ok(),
                started_at: None,
                finished_at: None,
                last_attempt_at: None,
            }),
            step: Mutex::new(action),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> &TaskDescription {
        &self.description
    }

    pub fn name(&self) -> &str {
        self.description.name()
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub fn identity_hash(&self) -> u64 {
        self.identity
    }

    pub fn state(&self) -> TaskState {
        self.lock_cell().state
    }

    pub fn progress(&self) -> u64 {
        self.lock_cell().progress
    }

    pub fn result(&self) -> ActionResult {
        self.lock_cell().result.clone()
    }

    /// True iff the task reached COMPLETE or FAILED.
    pub fn done(&self) -> bool {
        self.lock_cell().state.is_terminal()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock_cell().started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.lock_cell().finished_at
    }

    /// Consistent diagnostic view, read under one lock acquisition.
    pub fn record(&self) -> TaskRecord {
        let cell = self.lock_cell();
        TaskRecord {
            id: self.id,
            state: cell.state.code(),
            result: cell.result.code(),
            progress: cell.progress,
            name: self.description.name().to_string(),
            created_at: self.created_at,
            started_at: cell.started_at,
            finished_at: cell.finished_at,
        }
    }

    /// Earliest wall-clock time this task may be driven again, or `None`
    /// when it is not backoff-blocked.
    pub(crate) fn eligible_at(&self, block: Duration) -> Option<DateTime<Utc>> {
        let cell = self.lock_cell();
        if cell.state != TaskState::Waiting {
            return None;
        }
        let block = chrono::Duration::seconds(block.as_secs().min(i64::MAX as u64) as i64);
        cell.last_attempt_at.map(|at| at + block)
    }

    /// Drive one step: mark EXECUTING, invoke `first`/`next`, classify the
    /// outcome, and update progress, result and timestamps.
    ///
    /// A panicking step is contained here: the payload becomes an
    /// internal-error result and the task fails; the caller's thread
    /// survives.
    pub(crate) fn run_step(&self, ctx: &ActionContext) -> StepOutcome {
        let (progress, result) = {
            let mut cell = self.lock_cell();
            debug_assert!(!cell.state.is_terminal());
            cell.state = TaskState::Executing;
            if cell.started_at.is_none() {
                cell.started_at = Some(ctx.now());
            }
            (cell.progress, cell.result.clone())
        };

        let is_first = progress == 0;
        let mut step_cx = StepContext::new(progress, result, ctx);
        let mut action = self.step.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if is_first {
                action.first(&mut step_cx)
            } else {
                action.next(&mut step_cx)
            }
        }));
        drop(action);

        let now = ctx.now();
        let mut cell = self.lock_cell();
        cell.last_attempt_at = Some(now);
        match outcome {
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    task_id = self.id,
                    name = %self.description.name(),
                    progress = cell.progress,
                    error = %message,
                    "maintenance step terminated abnormally"
                );
                cell.result = ActionResult::internal(message);
                cell.state = TaskState::Failed;
                cell.finished_at = Some(now);
                StepOutcome::Finished
            }
            Ok(more) => {
                if more {
                    // Only steps that report remaining work advance the
                    // progress counter; a final step leaves it untouched.
                    cell.progress += 1;
                }
                cell.result = step_cx.into_result();
                if !cell.result.is_ok() {
                    tracing::warn!(
                        task_id = self.id,
                        name = %self.description.name(),
                        progress = cell.progress,
                        code = cell.result.code(),
                        "maintenance task failed"
                    );
                    cell.state = TaskState::Failed;
                    cell.finished_at = Some(now);
                    StepOutcome::Finished
                } else if more {
                    cell.state = if ctx.actions_block().is_zero() {
                        TaskState::Ready
                    } else {
                        TaskState::Waiting
                    };
                    StepOutcome::MoreWork
                } else {
                    tracing::info!(
                        task_id = self.id,
                        name = %self.description.name(),
                        progress = cell.progress,
                        "maintenance task complete"
                    );
                    cell.state = TaskState::Complete;
                    cell.finished_at = Some(now);
                    StepOutcome::Finished
                }
            }
        }
    }

    fn lock_cell(&self) -> std::sync::MutexGuard<'_, TaskCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.lock_cell();
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.description.name())
            .field("state", &cell.state)
            .field("progress", &cell.progress)
            .field("result", &cell.result)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "maintenance step panicked".to_string()
    }
}

/// Diagnostic view of one task, as emitted in registry snapshots.
///
/// `state` carries the wire code (see [`TaskState::code`]) and `result` the
/// numeric result code; timestamps serialize as ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: u64,
    pub state: u8,
    pub result: i32,
    pub progress: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
