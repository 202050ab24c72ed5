//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StitchSettings::default()`]
//! 2. If `~/.stitch/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `STITCH_*` environment overrides (highest priority)
//! 4. Validate ranges
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{StitchSettings, StorageBackend};

/// Resolve the path to the settings file (`~/.stitch/settings.json`).
pub fn settings_path() -> PathBuf {
    home_dir().join(".stitch").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StitchSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<StitchSettings> {
    let defaults = serde_json::to_value(StitchSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: StitchSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None if path == "~" => home_dir(),
        None => PathBuf::from(path),
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

/// Apply environment overrides, reading variables through `lookup`.
///
/// Invalid values are ignored with a warning (the file/default value stays).
pub fn apply_env_overrides<F>(settings: &mut StitchSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("STITCH_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("STITCH_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "STITCH_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = read("STITCH_SESSIONS_DIR") {
        settings.storage.sessions_dir = v;
    }
    if let Some(v) = read("STITCH_BACKUP_DIR") {
        settings.storage.backup_dir = Some(v);
    }
    if let Some(v) = read("STITCH_DB_PATH") {
        settings.storage.database_path = v;
    }
    if let Some(v) = read("STITCH_BACKEND") {
        match parse_backend(&v) {
            Some(b) => settings.storage.backend = b,
            None => warn!(key = "STITCH_BACKEND", value = %v, "unknown backend, ignoring"),
        }
    }

    // ── Suggester / scorer ──────────────────────────────────────────
    if let Some(v) = read("STITCH_TOP_K") {
        match parse_usize_range(&v, 1, 1000) {
            Some(n) => settings.suggest.top_k = n,
            None => warn!(key = "STITCH_TOP_K", value = %v, "invalid integer env var, ignoring"),
        }
    }
    if let Some(v) = read("STITCH_WINDOW_SECS") {
        match parse_f64_range(&v, f64::MIN_POSITIVE, 86_400.0) {
            Some(n) => settings.suggest.window_secs = n,
            None => warn!(key = "STITCH_WINDOW_SECS", value = %v, "invalid number env var, ignoring"),
        }
    }
    if let Some(v) = read("STITCH_MIN_CONFIDENCE") {
        match parse_f64_range(&v, 0.0, 1.0) {
            Some(n) => settings.suggest.min_confidence = n,
            None => warn!(key = "STITCH_MIN_CONFIDENCE", value = %v, "invalid number env var, ignoring"),
        }
    }
    if let Some(v) = read("STITCH_RESUME_EPSILON_MS") {
        match parse_u64_range(&v, 0, 3_600_000) {
            Some(n) => settings.scoring.resume_epsilon_ms = n,
            None => warn!(key = "STITCH_RESUME_EPSILON_MS", value = %v, "invalid integer env var, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a boolean: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a backend name (`mutation`, `eventSourced`, `event-sourced`).
pub fn parse_backend(val: &str) -> Option<StorageBackend> {
    match val.to_lowercase().replace(['-', '_'], "").as_str() {
        "mutation" => Some(StorageBackend::Mutation),
        "eventsourced" | "events" => Some(StorageBackend::EventSourced),
        _ => None,
    }
}

/// Parse a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a finite `f64` within a range.
pub fn parse_f64_range(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (n.is_finite() && n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
