//! End-to-end wiring demo: config -> factory -> runtime -> snapshot.
//!
//! Run with `cargo run -p upkeep-actions --example basic_usage`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use upkeep_actions::DefaultActionFactory;
use upkeep_config::UpkeepConfig;
use upkeep_core::{Runtime, RuntimeOptions, ServerPhase, TaskDescription};

fn main() -> anyhow::Result<()> {
    let config = UpkeepConfig::default();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.log_level.clone().into()),
        )
        .init();

    let options = RuntimeOptions {
        threads_max: config.maintenance.threads_max,
        seconds_actions_block: config.maintenance.seconds_actions_block,
        seconds_tasks_linger: config.maintenance.seconds_tasks_linger,
    };
    let runtime = Runtime::new(options, Arc::new(DefaultActionFactory::new()));

    // Normally the host lifecycle framework drives the reporter; here we
    // stand in for it and declare readiness straight away.
    runtime.reporter().state_change(ServerPhase::Ready);
    runtime.set_seconds_actions_block(0);
    runtime.start()?;

    runtime.add_action(
        TaskDescription::named("countdown").with("iterate_count", "5"),
        json!({ "reason": "demo work" }),
        false,
    )?;
    runtime.add_action(
        TaskDescription::named("linger")
            .with("steps", "3")
            .with("sleep_ms", "20"),
        json!({}),
        false,
    )?;
    runtime.add_action(TaskDescription::named("noop"), json!({}), false)?;

    while runtime.tasks().iter().any(|task| !task.done()) {
        thread::sleep(Duration::from_millis(10));
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&runtime.snapshot_json()?)?
    );

    runtime.begin_shutdown();
    Ok(())
}
