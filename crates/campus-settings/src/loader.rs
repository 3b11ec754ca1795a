//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CampusSettings::default()`]
//! 2. If `~/.campus/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `CAMPUS_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::CampusSettings;

/// Resolve the path to the settings file (`~/.campus/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".campus").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CampusSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<CampusSettings> {
    let defaults = serde_json::to_value(CampusSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: CampusSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Parsing is strict: integers must be valid and within range, and invalid
/// values are silently ignored (falling back to file/default).
pub fn apply_env_overrides(settings: &mut CampusSettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Override application against an arbitrary variable source, so tests can
/// inject values without touching the process environment.
fn apply_overrides_from(settings: &mut CampusSettings, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = read_string(&get, "CAMPUS_BASE_URL") {
        settings.sync.base_url = v;
    }
    if let Some(v) = read_string(&get, "CAMPUS_WS_PATH") {
        settings.sync.ws_path = v;
    }
    if let Some(v) = read_string(&get, "CAMPUS_ACTIVE_ENDPOINT") {
        settings.sync.active_endpoint = v;
    }
    if let Some(v) = read_u64(&get, "CAMPUS_RECONNECT_BASE_MS", 10, 600_000) {
        settings.sync.reconnect.base_delay_ms = v;
    }
    if let Some(v) = read_u64(&get, "CAMPUS_RECONNECT_MAX_MS", 10, 3_600_000) {
        settings.sync.reconnect.max_delay_ms = v;
    }
    if let Some(v) = read_usize(&get, "CAMPUS_SEND_QUEUE", 1, 65_536) {
        settings.sync.send_queue_size = v;
    }
}

fn read_string(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    get(key).filter(|v| !v.is_empty())
}

fn read_u64(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    min: u64,
    max: u64,
) -> Option<u64> {
    get(key)?
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_usize(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    min: usize,
    max: usize,
) -> Option<usize> {
    get(key)?
        .parse::<usize>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
