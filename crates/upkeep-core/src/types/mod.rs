//! Type definitions
//!
//! - TaskDescription: the immutable identity record of a work item
//! - Task: the stateful entity tracked by the registry
//! - TaskState / TaskRecord: state machine and diagnostic view

mod description;
mod task;

pub use description::TaskDescription;
pub use task::{Task, TaskRecord, TaskState};

pub(crate) use task::StepOutcome;
