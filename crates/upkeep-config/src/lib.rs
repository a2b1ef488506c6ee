//! # Upkeep Config
//!
//! Single-file YAML configuration for the upkeep runtime. One `upkeep.yaml`
//! configures the application identity, the maintenance scheduler knobs and
//! observability settings.

mod loader;

pub use loader::{load_config, ConfigError};

use serde::Deserialize;

/// Top-level configuration schema.
#[derive(Debug, Clone, Deserialize)]
pub struct UpkeepConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for UpkeepConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            maintenance: MaintenanceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "upkeep".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

/// Scheduler knobs, mirrored into the runtime at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Worker pool size; 0 disables the pool (synchronous-only mode).
    #[serde(default = "default_threads_max")]
    pub threads_max: usize,
    /// Retry-backoff window in seconds; 0 disables backoff.
    #[serde(default = "default_seconds_actions_block")]
    pub seconds_actions_block: u64,
    /// Grace window in seconds for terminal registry entries; 0 disables
    /// the dedup horizon and makes finished entries evictable immediately.
    #[serde(default)]
    pub seconds_tasks_linger: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            threads_max: default_threads_max(),
            seconds_actions_block: default_seconds_actions_block(),
            seconds_tasks_linger: 0,
        }
    }
}

fn default_threads_max() -> usize {
    2
}

fn default_seconds_actions_block() -> u64 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
