// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Maitred lifecycle engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Maitred configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MaitredConfig {
    /// Engine identity and logging settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Hold windows per action type.
    #[serde(default)]
    pub holds: HoldConfig,

    /// Expiry sweeper schedule settings.
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Confirmation gate settings.
    #[serde(default)]
    pub gate: GateConfig,

    /// Sharded counter settings.
    #[serde(default)]
    pub counters: CounterConfig,
}

/// Engine identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Instance name, used in log output when several engines share a host.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_instance_name() -> String {
    "maitred".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("maitred").join("maitred.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("maitred.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

/// Hold windows per action type, in seconds.
///
/// The window starts when the draft is created; when it lapses without a
/// terminal status the sweeper expires the job (or routes it to review).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HoldConfig {
    /// Taxi bookings move fast; a stale request is useless within minutes.
    #[serde(default = "default_taxi_hold_secs")]
    pub taxi_secs: i64,

    /// Table reservations.
    #[serde(default = "default_reservation_hold_secs")]
    pub reservation_secs: i64,

    /// Scheduled activities (tours, classes).
    #[serde(default = "default_activity_hold_secs")]
    pub activity_secs: i64,

    /// Experience packages.
    #[serde(default = "default_experience_hold_secs")]
    pub experience_secs: i64,

    /// Supply orders tolerate the longest merchant turnaround.
    #[serde(default = "default_supplies_hold_secs")]
    pub supplies_secs: i64,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            taxi_secs: default_taxi_hold_secs(),
            reservation_secs: default_reservation_hold_secs(),
            activity_secs: default_activity_hold_secs(),
            experience_secs: default_experience_hold_secs(),
            supplies_secs: default_supplies_hold_secs(),
        }
    }
}

fn default_taxi_hold_secs() -> i64 {
    600
}

fn default_reservation_hold_secs() -> i64 {
    1800
}

fn default_activity_hold_secs() -> i64 {
    3600
}

fn default_experience_hold_secs() -> i64 {
    7200
}

fn default_supplies_hold_secs() -> i64 {
    14400
}

/// Expiry sweeper schedule configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SweeperConfig {
    /// Seconds between sweep passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Maximum jobs processed per pass.
    #[serde(default = "default_sweep_batch_limit")]
    pub batch_limit: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            batch_limit: default_sweep_batch_limit(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    90
}

fn default_sweep_batch_limit() -> usize {
    100
}

/// Confirmation gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Grace added to pending-action expiry checks so the gate never races
    /// the sweeper over a hold that lapses mid-conversation.
    #[serde(default = "default_gate_buffer_secs")]
    pub expiry_buffer_secs: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            expiry_buffer_secs: default_gate_buffer_secs(),
        }
    }
}

fn default_gate_buffer_secs() -> i64 {
    30
}

/// Sharded counter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CounterConfig {
    /// Shard rows created when a counter is first used.
    #[serde(default = "default_counter_shards")]
    pub default_shards: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            default_shards: default_counter_shards(),
        }
    }
}

fn default_counter_shards() -> u32 {
    10
}
