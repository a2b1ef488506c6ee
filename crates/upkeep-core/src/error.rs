use std::sync::Arc;

use thiserror::Error;

use crate::types::Task;

/// Error kind, decoupled from the payload-carrying enum below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadParameter,
    Duplicate,
    ActionFailed,
    ShuttingDown,
    Internal,
}

/// Errors surfaced by admission and the runtime facade.
///
/// Execution failures are recorded on the task itself and are only returned
/// to the caller on the synchronous (`execute_now`) path.
#[derive(Debug, Error)]
pub enum UpkeepError {
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// An identical description is already admitted and still live; the
    /// existing handle is carried so callers can inspect or await it.
    #[error("duplicate of task {}", .existing.id())]
    Duplicate { existing: Arc<Task> },

    /// `execute_now` only: the task ran to completion with a failure code.
    #[error("task {} failed with code {}", .task.id(), .task.result().code())]
    ActionFailed { task: Arc<Task> },

    #[error("shutting down, no further tasks accepted")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}

impl UpkeepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadParameter(_) => ErrorKind::BadParameter,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::ActionFailed { .. } => ErrorKind::ActionFailed,
            Self::ShuttingDown => ErrorKind::ShuttingDown,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The task handle attached to this error, if any.
    pub fn task(&self) -> Option<&Arc<Task>> {
        match self {
            Self::Duplicate { existing } => Some(existing),
            Self::ActionFailed { task } => Some(task),
            _ => None,
        }
    }
}
