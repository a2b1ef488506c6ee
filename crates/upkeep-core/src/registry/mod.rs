//! Task registry
//!
//! The process-wide index of every admitted task: admission (with
//! identity-hash deduplication and id assignment), lookups, admission-ordered
//! snapshots for diagnostics, and grace-window eviction of finished entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::action::{ActionContext, ActionFactory};
use crate::error::UpkeepError;
use crate::types::{Task, TaskDescription, TaskRecord};

struct RegistryInner {
    next_id: u64,
    /// Admission order; ids are monotonic, so this stays sorted by id.
    order: Vec<Arc<Task>>,
    /// Latest task per identity hash.
    by_identity: HashMap<u64, Arc<Task>>,
}

/// Ordered set of all tasks admitted during this process lifetime.
///
/// One mutex guards the id counter, the admission-order list and the
/// identity index. The registry owns its tasks; everything handed out is an
/// `Arc<Task>` view.
pub struct TaskRegistry {
    inner: Mutex<RegistryInner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 1,
                order: Vec::new(),
                by_identity: HashMap::new(),
            }),
        }
    }

    /// Admit a described task: dedup by identity hash, build the plugin
    /// action through `factory`, assign the next id and insert in READY.
    ///
    /// An existing entry blocks admission while it is non-terminal, or —
    /// when a linger window is configured — while it finished within that
    /// window. The factory runs under the registry lock and must not block.
    pub fn admit(
        &self,
        description: TaskDescription,
        properties: Value,
        factory: &dyn ActionFactory,
        ctx: &ActionContext,
    ) -> Result<Arc<Task>, UpkeepError> {
        let identity = description.identity_hash();
        let mut inner = self.lock_inner();

        if let Some(existing) = inner.by_identity.get(&identity) {
            if blocks_admission(existing, ctx.tasks_linger(), ctx.now()) {
                tracing::debug!(
                    existing_id = existing.id(),
                    description = %description,
                    "duplicate task admission rejected"
                );
                return Err(UpkeepError::Duplicate {
                    existing: existing.clone(),
                });
            }
        }

        let action = factory
            .build(description.name(), &description, &properties, ctx)
            .map_err(|err| UpkeepError::BadParameter(err.to_string()))?;

        let id = inner.next_id;
        inner.next_id += 1;
        let task = Arc::new(Task::new(id, Arc::new(description), properties, action));
        tracing::info!(task_id = id, name = %task.name(), "maintenance task admitted");
        inner.by_identity.insert(identity, task.clone());
        inner.order.push(task.clone());
        Ok(task)
    }

    pub fn lookup(&self, id: u64) -> Option<Arc<Task>> {
        let inner = self.lock_inner();
        inner
            .order
            .binary_search_by_key(&id, |task| task.id())
            .ok()
            .map(|index| inner.order[index].clone())
    }

    pub fn lookup_by_identity(&self, identity: u64) -> Option<Arc<Task>> {
        self.lock_inner().by_identity.get(&identity).cloned()
    }

    /// Point-in-time snapshot of every task, in admission order. Tasks
    /// admitted after the call returns are not observed.
    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.lock_inner().order.clone()
    }

    pub fn len(&self) -> usize {
        self.lock_inner().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_inner().order.is_empty()
    }

    /// Serialize the registry as an admission-ordered record sequence.
    pub fn records(&self) -> Vec<TaskRecord> {
        self.tasks().iter().map(|task| task.record()).collect()
    }

    /// The record sequence as a JSON document.
    pub fn to_json(&self) -> Result<Value, UpkeepError> {
        serde_json::to_value(self.records()).map_err(|err| UpkeepError::Internal(err.to_string()))
    }

    /// Drop terminal tasks that finished more than `linger` ago. Returns the
    /// number of evicted entries. Non-terminal tasks are never touched.
    pub fn evict_finished(&self, linger: Duration, now: DateTime<Utc>) -> usize {
        let linger = chrono::Duration::seconds(linger.as_secs().min(i64::MAX as u64) as i64);
        let mut inner = self.lock_inner();
        let mut evicted = Vec::new();
        inner.order.retain(|task| {
            let expired = task.done()
                && task
                    .finished_at()
                    .map(|at| at + linger <= now)
                    .unwrap_or(false);
            if expired {
                evicted.push(task.clone());
            }
            !expired
        });
        for task in &evicted {
            // Only unlink the index entry if it still points at the evicted
            // task; a newer admission may have replaced it.
            if let Some(current) = inner.by_identity.get(&task.identity_hash()) {
                if Arc::ptr_eq(current, task) {
                    inner.by_identity.remove(&task.identity_hash());
                }
            }
            tracing::debug!(task_id = task.id(), name = %task.name(), "finished task evicted");
        }
        evicted.len()
    }

    fn lock_inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn blocks_admission(existing: &Task, linger: Duration, now: DateTime<Utc>) -> bool {
    if !existing.done() {
        return true;
    }
    if linger.is_zero() {
        return false;
    }
    let linger = chrono::Duration::seconds(linger.as_secs().min(i64::MAX as u64) as i64);
    existing
        .finished_at()
        .map(|at| at + linger > now)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionBuildError, StepContext};
    use crate::lifecycle::Lifecycle;
    use crate::runtime::OptionsCell;
    use crate::types::TaskState;
    use serde_json::json;

    struct OneShot;

    impl Action for OneShot {
        fn first(&mut self, _step: &mut StepContext<'_>) -> bool {
            false
        }

        fn next(&mut self, _step: &mut StepContext<'_>) -> bool {
            false
        }
    }

    struct OneShotFactory;

    impl ActionFactory for OneShotFactory {
        fn build(
            &self,
            name: &str,
            _description: &TaskDescription,
            _properties: &Value,
            _ctx: &ActionContext,
        ) -> Result<Box<dyn Action>, ActionBuildError> {
            if name == "one_shot" {
                Ok(Box::new(OneShot))
            } else {
                Err(ActionBuildError::UnknownName(name.to_string()))
            }
        }
    }

    fn context(linger_secs: u64) -> ActionContext {
        ActionContext::new(
            Arc::new(Lifecycle::new()),
            Arc::new(OptionsCell::new(0, linger_secs)),
        )
    }

    fn admit(
        registry: &TaskRegistry,
        ctx: &ActionContext,
        description: TaskDescription,
    ) -> Result<Arc<Task>, UpkeepError> {
        registry.admit(description, json!({}), &OneShotFactory, ctx)
    }

    #[test]
    fn test_admission_assigns_monotonic_ids() {
        let registry = TaskRegistry::new();
        let ctx = context(0);
        let a = admit(&registry, &ctx, TaskDescription::named("one_shot")).expect("admit a");
        let b = admit(
            &registry,
            &ctx,
            TaskDescription::named("one_shot").with("shard", "s1"),
        )
        .expect("admit b");
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_admission_returns_existing_task() {
        let registry = TaskRegistry::new();
        let ctx = context(0);
        let first = admit(&registry, &ctx, TaskDescription::named("one_shot")).expect("admit");
        let err = admit(&registry, &ctx, TaskDescription::named("one_shot")).unwrap_err();
        match err {
            UpkeepError::Duplicate { existing } => assert!(Arc::ptr_eq(&existing, &first)),
            other => panic!("expected duplicate error, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_plugin_name_leaves_registry_unchanged() {
        let registry = TaskRegistry::new();
        let ctx = context(0);
        let err = admit(&registry, &ctx, TaskDescription::named("no_such_plugin")).unwrap_err();
        assert!(matches!(err, UpkeepError::BadParameter(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_terminal_task_unblocks_readmission_without_linger() {
        let registry = TaskRegistry::new();
        let ctx = context(0);
        let first = admit(&registry, &ctx, TaskDescription::named("one_shot")).expect("admit");
        first.run_step(&ctx);
        assert_eq!(first.state(), TaskState::Complete);

        let second = admit(&registry, &ctx, TaskDescription::named("one_shot")).expect("readmit");
        assert_eq!(second.id(), 2);
        assert_eq!(registry.len(), 2);
        // The identity index now resolves to the newer task.
        let current = registry
            .lookup_by_identity(second.identity_hash())
            .expect("indexed");
        assert!(Arc::ptr_eq(&current, &second));
    }

    #[test]
    fn test_recently_finished_task_blocks_readmission_within_linger() {
        let registry = TaskRegistry::new();
        let ctx = context(3600);
        let first = admit(&registry, &ctx, TaskDescription::named("one_shot")).expect("admit");
        first.run_step(&ctx);
        assert!(first.done());

        let err = admit(&registry, &ctx, TaskDescription::named("one_shot")).unwrap_err();
        assert!(matches!(err, UpkeepError::Duplicate { .. }));
    }

    #[test]
    fn test_lookup_by_id_and_identity() {
        let registry = TaskRegistry::new();
        let ctx = context(0);
        let task = admit(
            &registry,
            &ctx,
            TaskDescription::named("one_shot").with("db", "d1"),
        )
        .expect("admit");
        assert!(registry.lookup(task.id()).is_some());
        assert!(registry.lookup(99).is_none());
        let by_identity = registry
            .lookup_by_identity(task.identity_hash())
            .expect("identity");
        assert!(Arc::ptr_eq(&by_identity, &task));
    }

    #[test]
    fn test_records_round_trip_through_json() {
        let registry = TaskRegistry::new();
        let ctx = context(0);
        let task = admit(&registry, &ctx, TaskDescription::named("one_shot")).expect("admit");
        task.run_step(&ctx);

        let records = registry.records();
        let document = registry.to_json().expect("document");
        let parsed: Vec<TaskRecord> =
            serde_json::from_value(document).expect("snapshot parses back");
        assert_eq!(parsed, records);
        assert_eq!(parsed[0].id, 1);
        assert_eq!(parsed[0].state, 5);
    }

    #[test]
    fn test_eviction_drops_only_expired_terminal_tasks() {
        let registry = TaskRegistry::new();
        let ctx = context(0);
        let finished = admit(&registry, &ctx, TaskDescription::named("one_shot")).expect("admit");
        finished.run_step(&ctx);
        let pending = admit(
            &registry,
            &ctx,
            TaskDescription::named("one_shot").with("shard", "s1"),
        )
        .expect("admit");

        // Not yet expired under a one-hour window.
        assert_eq!(registry.evict_finished(Duration::from_secs(3600), ctx.now()), 0);
        // Expired immediately under a zero window.
        assert_eq!(registry.evict_finished(Duration::ZERO, ctx.now()), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(pending.id()).is_some());
        assert!(registry.lookup(finished.id()).is_none());
        assert!(registry
            .lookup_by_identity(finished.identity_hash())
            .is_none());
    }
}
