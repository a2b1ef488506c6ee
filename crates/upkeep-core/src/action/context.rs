//! ActionContext: capabilities handed to actions at construction time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::lifecycle::Lifecycle;
use crate::runtime::OptionsCell;

/// Capability interface actions (and the step driver) use instead of a
/// back-pointer into the runtime: wall clock, the shutdown flag, and live
/// reads of the runtime options.
#[derive(Clone)]
pub struct ActionContext {
    lifecycle: Arc<Lifecycle>,
    options: Arc<OptionsCell>,
}

impl ActionContext {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>, options: Arc<OptionsCell>) -> Self {
        Self { lifecycle, options }
    }

    /// Current wall-clock time.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// True once the host shutdown-begin edge has been observed. Actions
    /// with long tails should poll this between steps and finish early.
    pub fn shutdown_requested(&self) -> bool {
        self.lifecycle.shutdown_requested()
    }

    /// Minimum delay between a step that reported more work and the next
    /// attempt at the same task. Zero disables backoff.
    pub fn actions_block(&self) -> Duration {
        Duration::from_secs(self.options.seconds_actions_block())
    }

    /// Grace window for terminal registry entries (dedup horizon and
    /// eviction age). Zero disables both effects.
    pub fn tasks_linger(&self) -> Duration {
        Duration::from_secs(self.options.seconds_tasks_linger())
    }
}
