// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./maitred.toml` > `~/.config/maitred/maitred.toml`
//! > `/etc/maitred/maitred.toml` with environment variable overrides via the
//! `MAITRED_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MaitredConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/maitred/maitred.toml` (system-wide)
/// 3. `~/.config/maitred/maitred.toml` (user XDG config)
/// 4. `./maitred.toml` (local directory)
/// 5. `MAITRED_*` environment variables
pub fn load_config() -> Result<MaitredConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and for callers that supply their own TOML.
pub fn load_config_from_str(toml_content: &str) -> Result<MaitredConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MaitredConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MaitredConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MaitredConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for
/// diagnostic use so callers can inspect provider metadata).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MaitredConfig::default()))
        .merge(Toml::file("/etc/maitred/maitred.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("maitred/maitred.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("maitred.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `MAITRED_STORAGE_DATABASE_PATH` must map to
/// `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("MAITRED_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        // Example: MAITRED_SWEEPER_BATCH_LIMIT -> "sweeper_batch_limit"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("holds_", "holds.", 1)
            .replacen("sweeper_", "sweeper.", 1)
            .replacen("gate_", "gate.", 1)
            .replacen("counters_", "counters.", 1);
        mapped.into()
    })
}
