//! Dispatcher
//!
//! A bounded pool of OS worker threads over a FIFO queue of runnable tasks.
//! Workers pop the first eligible task (skipping entries still inside their
//! retry-backoff window), drive one step, and re-enqueue the task at the
//! tail while it reports more work. Shutdown wakes and joins every worker;
//! whatever is left in the queue stays visible in the registry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use crate::action::ActionContext;
use crate::error::UpkeepError;
use crate::runtime::OptionsCell;
use crate::types::{StepOutcome, Task};

struct Shared {
    queue: Mutex<VecDeque<Arc<Task>>>,
    available: Condvar,
    stop: AtomicBool,
    options: Arc<OptionsCell>,
}

impl Shared {
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Arc<Task>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, task: Arc<Task>) {
        self.lock_queue().push_back(task);
        self.available.notify_one();
    }

    /// Block until an eligible task can be popped or shutdown is signalled.
    fn next_task(&self) -> Option<Arc<Task>> {
        let mut queue = self.lock_queue();
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return None;
            }
            let now = Utc::now();
            let block = Duration::from_secs(self.options.seconds_actions_block());
            if let Some(position) = queue
                .iter()
                .position(|task| task.eligible_at(block).map_or(true, |at| at <= now))
            {
                return queue.remove(position);
            }
            if queue.is_empty() {
                queue = self
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            } else {
                // Everything queued is backoff-blocked; sleep until the
                // soonest deadline (or an enqueue/shutdown wakes us).
                let soonest = queue.iter().filter_map(|task| task.eligible_at(block)).min();
                let wait = soonest
                    .and_then(|at| (at - now).to_std().ok())
                    .unwrap_or(Duration::ZERO)
                    .max(Duration::from_millis(1));
                let (guard, _timeout) = self
                    .available
                    .wait_timeout(queue, wait)
                    .unwrap_or_else(PoisonError::into_inner);
                queue = guard;
            }
        }
    }
}

/// Bounded worker pool executing registry tasks.
pub struct Dispatcher {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Dispatcher {
    pub(crate) fn new(options: Arc<OptionsCell>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
                stop: AtomicBool::new(false),
                options,
            }),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Queue a task for execution. Safe to call before the pool is started;
    /// entries simply wait until workers exist.
    pub fn enqueue(&self, task: Arc<Task>) {
        tracing::debug!(task_id = task.id(), name = %task.name(), "task queued");
        self.shared.push(task);
    }

    /// Spawn `count` workers. One-shot: later calls are ignored with a
    /// warning. `count == 0` leaves the pool empty (synchronous-only mode).
    pub fn start(&self, count: usize, ctx: ActionContext) -> Result<(), UpkeepError> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("dispatcher already started, ignoring");
            return Ok(());
        }
        tracing::info!(workers = count, "starting maintenance workers");
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for index in 0..count {
            let shared = self.shared.clone();
            let ctx = ctx.clone();
            let handle = thread::Builder::new()
                .name(format!("upkeep-worker-{index}"))
                .spawn(move || worker_loop(shared, ctx))
                .map_err(|err| UpkeepError::Internal(format!("spawn worker: {err}")))?;
            workers.push(handle);
        }
        Ok(())
    }

    /// Stop intake, wake every worker and join them. Idempotent. Queued
    /// tasks are left non-terminal for post-mortem inspection.
    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.available.notify_all();
        let handles: Vec<_> = {
            let mut workers = self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            workers.drain(..).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("maintenance worker panicked outside a step");
            }
        }
    }

    /// Number of queued (not currently executing) tasks.
    pub fn queue_depth(&self) -> usize {
        self.shared.lock_queue().len()
    }
}

fn worker_loop(shared: Arc<Shared>, ctx: ActionContext) {
    tracing::debug!("maintenance worker running");
    while let Some(task) = shared.next_task() {
        match task.run_step(&ctx) {
            StepOutcome::MoreWork => shared.push(task),
            StepOutcome::Finished => {}
        }
    }
    tracing::debug!("maintenance worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, StepContext};
    use crate::lifecycle::Lifecycle;
    use crate::types::{TaskDescription, TaskState};
    use serde_json::json;
    use std::time::Instant;

    struct Countdown {
        remaining: u64,
    }

    impl Action for Countdown {
        fn first(&mut self, step: &mut StepContext<'_>) -> bool {
            self.step(step)
        }

        fn next(&mut self, step: &mut StepContext<'_>) -> bool {
            self.step(step)
        }
    }

    impl Countdown {
        fn step(&mut self, _step: &mut StepContext<'_>) -> bool {
            if self.remaining == 0 {
                return false;
            }
            self.remaining -= 1;
            true
        }
    }

    fn fixture(block_secs: u64) -> (Dispatcher, ActionContext) {
        let options = Arc::new(OptionsCell::new(block_secs, 0));
        let ctx = ActionContext::new(Arc::new(Lifecycle::new()), options.clone());
        (Dispatcher::new(options), ctx)
    }

    fn task(id: u64, steps: u64) -> Arc<Task> {
        Arc::new(Task::new(
            id,
            Arc::new(TaskDescription::named("countdown").with("steps", steps.to_string())),
            json!({}),
            Box::new(Countdown { remaining: steps }),
        ))
    }

    fn wait_until_done(tasks: &[Arc<Task>]) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while tasks.iter().any(|task| !task.done()) {
            assert!(Instant::now() < deadline, "tasks did not drain in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_queued_tasks_wait_until_workers_start() {
        let (dispatcher, ctx) = fixture(0);
        let task = task(1, 2);
        dispatcher.enqueue(task.clone());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(dispatcher.queue_depth(), 1);

        dispatcher.start(1, ctx).expect("start");
        wait_until_done(&[task.clone()]);
        assert_eq!(task.state(), TaskState::Complete);
        assert_eq!(task.progress(), 2);
        dispatcher.shutdown();
    }

    #[test]
    fn test_single_worker_drains_multiple_tasks() {
        let (dispatcher, ctx) = fixture(0);
        let tasks = vec![task(1, 3), task(2, 0), task(3, 5)];
        for task in &tasks {
            dispatcher.enqueue(task.clone());
        }
        dispatcher.start(1, ctx).expect("start");
        wait_until_done(&tasks);
        assert!(tasks.iter().all(|task| task.state() == TaskState::Complete));
        dispatcher.shutdown();
        assert_eq!(dispatcher.queue_depth(), 0);
    }

    #[test]
    fn test_backoff_window_delays_the_next_attempt() {
        let (dispatcher, ctx) = fixture(1);
        let task = task(1, 1);
        dispatcher.enqueue(task.clone());
        dispatcher.start(1, ctx).expect("start");

        // The first step parks the task in WAITING for the 1s window.
        let deadline = Instant::now() + Duration::from_secs(10);
        while task.state() != TaskState::Waiting {
            assert!(Instant::now() < deadline, "task never reached WAITING");
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(300));
        assert!(!task.done(), "second step ran inside the backoff window");

        wait_until_done(&[task.clone()]);
        assert_eq!(task.state(), TaskState::Complete);
        assert_eq!(task.progress(), 1);
        dispatcher.shutdown();
    }

    #[test]
    fn test_second_start_is_ignored() {
        let (dispatcher, ctx) = fixture(0);
        dispatcher.start(1, ctx.clone()).expect("start");
        dispatcher.start(4, ctx).expect("second start is a no-op");
        dispatcher.shutdown();
    }

    #[test]
    fn test_shutdown_without_start_is_clean() {
        let (dispatcher, _ctx) = fixture(0);
        dispatcher.enqueue(task(1, 1));
        dispatcher.shutdown();
        assert_eq!(dispatcher.queue_depth(), 1);
    }
}
