//! Built-in maintenance actions.
//!
//! Small generic actions useful for smoke tests, demos and as templates for
//! real administrative plugins:
//! - `noop`: completes on its first step
//! - `countdown`: N steps of simulated work, optional failure code at the end
//! - `linger`: sleeps per step, finishing early when shutdown begins

use std::thread;
use std::time::Duration;

use upkeep_core::action::{Action, ActionBuildError, StepContext};
use upkeep_core::types::TaskDescription;

pub(crate) fn build_builtin_action(
    name: &str,
    description: &TaskDescription,
) -> Option<Result<Box<dyn Action>, ActionBuildError>> {
    match name {
        "noop" => Some(Ok(Box::new(Noop))),
        "countdown" => Some(Countdown::from_description(description).map(boxed)),
        "linger" => Some(Linger::from_description(description).map(boxed)),
        _ => None,
    }
}

fn boxed<A: Action + 'static>(action: A) -> Box<dyn Action> {
    Box::new(action)
}

fn parse_extra<T: std::str::FromStr>(
    description: &TaskDescription,
    key: &str,
    default: T,
) -> Result<T, ActionBuildError> {
    match description.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ActionBuildError::Invalid {
            name: description.name().to_string(),
            reason: format!("'{key}' must be an integer, got '{raw}'"),
        }),
    }
}

/// Does nothing and completes immediately.
pub struct Noop;

impl Action for Noop {
    fn first(&mut self, _step: &mut StepContext<'_>) -> bool {
        false
    }

    fn next(&mut self, _step: &mut StepContext<'_>) -> bool {
        false
    }
}

/// Simulated multi-step work item.
///
/// Reads `iterate_count` (default 1, negative values clamped to 1) and
/// `result_code` (default 0) from the description. Reports more work for
/// `iterate_count` steps, then finishes, setting `result_code` when it is
/// non-zero.
pub struct Countdown {
    remaining: i64,
    result_code: i32,
}

impl Countdown {
    pub fn from_description(description: &TaskDescription) -> Result<Self, ActionBuildError> {
        let mut remaining = parse_extra(description, "iterate_count", 1i64)?;
        if remaining < 0 {
            remaining = 1;
        }
        let result_code = parse_extra(description, "result_code", 0i32)?;
        Ok(Self {
            remaining,
            result_code,
        })
    }

    fn step(&mut self, step: &mut StepContext<'_>) -> bool {
        if self.remaining == 0 {
            if self.result_code != 0 {
                step.fail(self.result_code, "countdown drained with failure code");
            }
            return false;
        }
        self.remaining -= 1;
        true
    }
}

impl Action for Countdown {
    fn first(&mut self, step: &mut StepContext<'_>) -> bool {
        self.step(step)
    }

    fn next(&mut self, step: &mut StepContext<'_>) -> bool {
        self.step(step)
    }
}

/// Occupies a worker: sleeps `sleep_ms` (default 10) per step for `steps`
/// (default 1) steps, checking the shutdown flag between steps and
/// finishing early once shutdown begins.
pub struct Linger {
    remaining: i64,
    pause: Duration,
}

impl Linger {
    pub fn from_description(description: &TaskDescription) -> Result<Self, ActionBuildError> {
        let remaining = parse_extra(description, "steps", 1i64)?.max(0);
        let sleep_ms = parse_extra(description, "sleep_ms", 10u64)?;
        Ok(Self {
            remaining,
            pause: Duration::from_millis(sleep_ms),
        })
    }

    fn step(&mut self, step: &mut StepContext<'_>) -> bool {
        if self.remaining == 0 {
            return false;
        }
        if step.context().shutdown_requested() {
            tracing::debug!(remaining = self.remaining, "linger cut short by shutdown");
            return false;
        }
        thread::sleep(self.pause);
        self.remaining -= 1;
        true
    }
}

impl Action for Linger {
    fn first(&mut self, step: &mut StepContext<'_>) -> bool {
        self.step(step)
    }

    fn next(&mut self, step: &mut StepContext<'_>) -> bool {
        self.step(step)
    }
}
