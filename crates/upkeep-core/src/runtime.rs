//! Runtime facade
//!
//! Thin layer combining the registry, dispatcher, host lifecycle gate and
//! the host-supplied action factory into the public maintenance surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::action::{ActionContext, ActionFactory};
use crate::dispatcher::Dispatcher;
use crate::error::UpkeepError;
use crate::lifecycle::{HostReporter, Lifecycle};
use crate::registry::TaskRegistry;
use crate::types::{StepOutcome, Task, TaskDescription, TaskRecord};

/// Construction-time runtime options.
///
/// `threads_max == 0` disables the worker pool: only `execute_now`
/// admissions make progress. `seconds_actions_block == 0` disables retry
/// backoff. `seconds_tasks_linger` is the grace window for terminal registry
/// entries (dedup horizon and eviction age); 0 disables both effects.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub threads_max: usize,
    pub seconds_actions_block: u64,
    pub seconds_tasks_linger: u64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            threads_max: 2,
            seconds_actions_block: 2,
            seconds_tasks_linger: 0,
        }
    }
}

/// Live (reconfigurable) option values shared between the facade, the
/// dispatcher and every [`ActionContext`].
pub(crate) struct OptionsCell {
    seconds_actions_block: AtomicU64,
    seconds_tasks_linger: AtomicU64,
}

impl OptionsCell {
    pub(crate) fn new(seconds_actions_block: u64, seconds_tasks_linger: u64) -> Self {
        Self {
            seconds_actions_block: AtomicU64::new(seconds_actions_block),
            seconds_tasks_linger: AtomicU64::new(seconds_tasks_linger),
        }
    }

    pub(crate) fn seconds_actions_block(&self) -> u64 {
        self.seconds_actions_block.load(Ordering::Relaxed)
    }

    pub(crate) fn set_seconds_actions_block(&self, seconds: u64) {
        self.seconds_actions_block.store(seconds, Ordering::Relaxed);
    }

    pub(crate) fn seconds_tasks_linger(&self) -> u64 {
        self.seconds_tasks_linger.load(Ordering::Relaxed)
    }
}

/// The maintenance runtime: public entry point for admitting work,
/// inspecting the registry, and coordinating startup/shutdown with the
/// host application.
pub struct Runtime {
    registry: Arc<TaskRegistry>,
    dispatcher: Arc<Dispatcher>,
    lifecycle: Arc<Lifecycle>,
    options: Arc<OptionsCell>,
    factory: Arc<dyn ActionFactory>,
    threads_max: usize,
}

impl Runtime {
    pub fn new(options: RuntimeOptions, factory: Arc<dyn ActionFactory>) -> Self {
        let cell = Arc::new(OptionsCell::new(
            options.seconds_actions_block,
            options.seconds_tasks_linger,
        ));
        Self {
            registry: Arc::new(TaskRegistry::new()),
            dispatcher: Arc::new(Dispatcher::new(cell.clone())),
            lifecycle: Arc::new(Lifecycle::new()),
            options: cell,
            factory,
            threads_max: options.threads_max,
        }
    }

    /// The observer to register with the host lifecycle framework.
    pub fn reporter(&self) -> HostReporter {
        HostReporter::new(self.lifecycle.clone())
    }

    /// Admit a described task.
    ///
    /// With `execute_now` the freshly admitted task is driven to completion
    /// on the calling thread and a failing final result comes back as
    /// [`UpkeepError::ActionFailed`] (the handle stays attached). Otherwise
    /// the task is queued and the returned `Ok` only reflects admission;
    /// execution outcome is observed through the registry.
    pub fn add_action(
        &self,
        description: TaskDescription,
        properties: Value,
        execute_now: bool,
    ) -> Result<Arc<Task>, UpkeepError> {
        if self.lifecycle.shutdown_requested() {
            return Err(UpkeepError::ShuttingDown);
        }
        let ctx = self.context();
        let task = self
            .registry
            .admit(description, properties, self.factory.as_ref(), &ctx)?;
        if execute_now {
            self.drive_to_completion(task, &ctx)
        } else {
            self.dispatcher.enqueue(task.clone());
            Ok(task)
        }
    }

    /// Reconfigure the retry-backoff window; takes effect for the next
    /// re-enqueue decision.
    pub fn set_seconds_actions_block(&self, seconds: u64) {
        self.options.set_seconds_actions_block(seconds);
    }

    /// Block until the host ready edge, then spawn `count` workers.
    /// One-shot, like the dispatcher start it wraps.
    pub fn set_threads_max(&self, count: usize) -> Result<(), UpkeepError> {
        self.lifecycle.wait_until_ready();
        if self.lifecycle.shutdown_requested() {
            return Err(UpkeepError::ShuttingDown);
        }
        self.dispatcher.start(count, self.context())
    }

    /// Start the worker pool with the configured `threads_max`.
    pub fn start(&self) -> Result<(), UpkeepError> {
        self.set_threads_max(self.threads_max)
    }

    /// Shutdown-begin edge: reject further admissions, wake and join every
    /// worker. Terminal and non-terminal tasks alike stay in the registry
    /// for post-mortem inspection. Idempotent.
    pub fn begin_shutdown(&self) {
        self.lifecycle.begin_shutdown();
        self.dispatcher.shutdown();
    }

    /// Admission-ordered diagnostic snapshot.
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.registry.records()
    }

    /// The snapshot as a JSON document.
    pub fn snapshot_json(&self) -> Result<Value, UpkeepError> {
        self.registry.to_json()
    }

    /// The snapshot serialized to bytes, for handing to diagnostics
    /// endpoints.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>, UpkeepError> {
        serde_json::to_vec(&self.registry.records())
            .map_err(|err| UpkeepError::Internal(err.to_string()))
    }

    pub fn lookup(&self, id: u64) -> Option<Arc<Task>> {
        self.registry.lookup(id)
    }

    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.registry.tasks()
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Apply the linger policy: drop terminal tasks older than the grace
    /// window. Returns the number of evicted entries.
    pub fn evict_finished(&self) -> usize {
        let linger = Duration::from_secs(self.options.seconds_tasks_linger());
        self.registry.evict_finished(linger, Utc::now())
    }

    fn context(&self) -> ActionContext {
        ActionContext::new(self.lifecycle.clone(), self.options.clone())
    }

    fn drive_to_completion(
        &self,
        task: Arc<Task>,
        ctx: &ActionContext,
    ) -> Result<Arc<Task>, UpkeepError> {
        loop {
            match task.run_step(ctx) {
                StepOutcome::Finished => break,
                StepOutcome::MoreWork => {
                    // Honor the backoff window on the synchronous path too.
                    if let Some(at) = task.eligible_at(ctx.actions_block()) {
                        if let Ok(wait) = (at - ctx.now()).to_std() {
                            thread::sleep(wait);
                        }
                    }
                }
            }
        }
        if task.result().is_ok() {
            Ok(task)
        } else {
            Err(UpkeepError::ActionFailed { task })
        }
    }
}

impl Drop for Runtime {
    // Workers must never outlive the facade.
    fn drop(&mut self) {
        self.begin_shutdown();
    }
}
