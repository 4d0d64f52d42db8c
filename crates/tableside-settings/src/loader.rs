//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TablesideSettings::default()`]
//! 2. If `~/.tableside/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TABLESIDE_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{TablesideSettings, TransportKind};

/// Resolve the path to the settings file (`~/.tableside/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tableside").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TablesideSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid final value
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TablesideSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<TablesideSettings> {
    let defaults = serde_json::to_value(TablesideSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
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

/// Apply `TABLESIDE_*` environment variable overrides.
///
/// Invalid values are logged and ignored (file/default value stays).
pub fn apply_env_overrides(settings: &mut TablesideSettings) {
    apply_overrides_from(settings, &|name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable lookup.
pub fn apply_overrides_from(
    settings: &mut TablesideSettings,
    lookup: &dyn Fn(&str) -> Option<String>,
) {
    let env = EnvReader { lookup };

    // ── Realtime ────────────────────────────────────────────────────
    if let Some(v) = env.string("TABLESIDE_ENDPOINT") {
        settings.realtime.endpoint = v;
    }
    if let Some(v) = env.transport("TABLESIDE_TRANSPORT") {
        settings.realtime.transport = v;
    }
    if let Some(v) = env.string("TABLESIDE_RESTAURANT_ID") {
        settings.realtime.restaurant_id = Some(v);
    }
    if let Some(v) = env.u64("TABLESIDE_HEARTBEAT_TIMEOUT_MS", 1000, 600_000) {
        settings.realtime.heartbeat_timeout_ms = v;
    }
    if let Some(v) = env.u32("TABLESIDE_MAX_ATTEMPTS", 0, 1000) {
        settings.realtime.retry.max_attempts = v;
    }
    if let Some(v) = env.u64("TABLESIDE_BASE_DELAY_MS", 1, 600_000) {
        settings.realtime.retry.base_delay_ms = v;
    }
    if let Some(v) = env.u64("TABLESIDE_MAX_DELAY_MS", 1, 3_600_000) {
        settings.realtime.retry.max_delay_ms = v;
    }

    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("TABLESIDE_API_URL") {
        settings.api.base_url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TABLESIDE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject settings the channel cannot run with.
pub fn validate(settings: &TablesideSettings) -> Result<()> {
    let realtime = &settings.realtime;
    if realtime.endpoint.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "realtime.endpoint must not be empty".to_string(),
        ));
    }
    if realtime.heartbeat_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "realtime.heartbeatTimeoutMs must be > 0".to_string(),
        ));
    }
    if realtime.notice_capacity == 0 || realtime.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "realtime queue capacities must be > 0".to_string(),
        ));
    }
    let retry = &realtime.retry;
    if retry.base_delay_ms > retry.max_delay_ms {
        return Err(SettingsError::InvalidValue(format!(
            "realtime.retry.baseDelayMs ({}) exceeds maxDelayMs ({})",
            retry.base_delay_ms, retry.max_delay_ms
        )));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(SettingsError::InvalidValue(format!(
            "realtime.retry.jitterFactor must be within 0.0..=1.0, got {}",
            retry.jitter_factor
        )));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvReader<'_> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn transport(&self, name: &str) -> Option<TransportKind> {
        let val = self.string(name)?;
        let result = TransportKind::parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid transport env var, ignoring");
        }
        result
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        let val = self.string(name)?;
        let result = parse_u32_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use serde_json::json;
    use tableside_core::logging::capture_logs;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn apply(settings: &mut TablesideSettings, pairs: &[(&str, &str)]) {
        let map = vars(pairs);
        apply_overrides_from(settings, &|name| map.get(name).cloned());
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = json!({"a": 1, "b": 2});
        let source = json!({"b": 3});
        assert_eq!(deep_merge(target, source), json!({"a": 1, "b": 3}));
    }

    #[test]
    fn merge_nested_objects() {
        let target = json!({"realtime": {"endpoint": "x", "retry": {"maxAttempts": 10}}});
        let source = json!({"realtime": {"retry": {"maxAttempts": 3}}});
        assert_eq!(
            deep_merge(target, source),
            json!({"realtime": {"endpoint": "x", "retry": {"maxAttempts": 3}}})
        );
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = json!({"a": 1});
        let source = json!({"a": null});
        assert_eq!(deep_merge(target, source), json!({"a": 1}));
    }

    #[test]
    fn merge_arrays_replace() {
        let target = json!({"list": [1, 2, 3]});
        let source = json!({"list": [4]});
        assert_eq!(deep_merge(target, source), json!({"list": [4]}));
    }

    #[test]
    fn merge_adds_new_keys() {
        let target = json!({"a": 1});
        let source = json!({"z": true});
        assert_eq!(deep_merge(target, source), json!({"a": 1, "z": true}));
    }

    // ── loading ─────────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, TablesideSettings::default());
    }

    #[test]
    fn load_partial_file_merges_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"realtime": {"transport": "websocket", "endpoint": "ws://kds.local/ws", "retry": {"maxAttempts": 3}}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.realtime.transport, TransportKind::WebSocket);
        assert_eq!(settings.realtime.endpoint, "ws://kds.local/ws");
        assert_eq!(settings.realtime.retry.max_attempts, 3);
        assert_eq!(settings.realtime.retry.base_delay_ms, 1000);
        assert_eq!(settings.realtime.heartbeat_timeout_ms, 60_000);
    }

    #[test]
    fn load_invalid_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_matches!(load_file_layer(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"realtime": {"heartbeatTimeoutMs": 0}}"#).unwrap();
        let settings = load_file_layer(&path).unwrap();
        assert_matches!(validate(&settings), Err(SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = TablesideSettings::default();
        apply(
            &mut settings,
            &[
                ("TABLESIDE_ENDPOINT", "wss://kds.example/ws"),
                ("TABLESIDE_TRANSPORT", "ws"),
                ("TABLESIDE_RESTAURANT_ID", "r-42"),
                ("TABLESIDE_HEARTBEAT_TIMEOUT_MS", "15000"),
                ("TABLESIDE_MAX_ATTEMPTS", "4"),
                ("TABLESIDE_API_URL", "https://api.example"),
                ("TABLESIDE_LOG_LEVEL", "debug"),
            ],
        );
        assert_eq!(settings.realtime.endpoint, "wss://kds.example/ws");
        assert_eq!(settings.realtime.transport, TransportKind::WebSocket);
        assert_eq!(settings.realtime.restaurant_id.as_deref(), Some("r-42"));
        assert_eq!(settings.realtime.heartbeat_timeout_ms, 15_000);
        assert_eq!(settings.realtime.retry.max_attempts, 4);
        assert_eq!(settings.api.base_url, "https://api.example");
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn env_out_of_range_is_ignored_and_logged() {
        let (logs, _guard) = capture_logs();
        let mut settings = TablesideSettings::default();
        apply(
            &mut settings,
            &[
                ("TABLESIDE_HEARTBEAT_TIMEOUT_MS", "5"),
                ("TABLESIDE_MAX_ATTEMPTS", "lots"),
                ("TABLESIDE_TRANSPORT", "smoke-signal"),
            ],
        );
        assert_eq!(settings.realtime.heartbeat_timeout_ms, 60_000);
        assert_eq!(settings.realtime.retry.max_attempts, 10);
        assert_eq!(settings.realtime.transport, TransportKind::Sse);
        assert_eq!(logs.count_at_level(tracing::Level::WARN), 3);
    }

    #[test]
    fn env_empty_string_is_ignored() {
        let mut settings = TablesideSettings::default();
        apply(&mut settings, &[("TABLESIDE_ENDPOINT", "")]);
        assert_eq!(settings.realtime.endpoint, TablesideSettings::default().realtime.endpoint);
    }

    // ── validation ──────────────────────────────────────────────────

    #[test]
    fn validate_defaults_ok() {
        validate(&TablesideSettings::default()).unwrap();
    }

    #[test]
    fn validate_base_above_cap() {
        let mut settings = TablesideSettings::default();
        settings.realtime.retry.base_delay_ms = 60_000;
        assert_matches!(validate(&settings), Err(SettingsError::InvalidValue(msg)) if msg.contains("baseDelayMs"));
    }

    #[test]
    fn validate_jitter_range() {
        let mut settings = TablesideSettings::default();
        settings.realtime.retry.jitter_factor = 1.5;
        assert!(validate(&settings).is_err());
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("1000", 1000, 600_000), Some(1000));
        assert_eq!(parse_u64_range("999", 1000, 600_000), None);
        assert_eq!(parse_u32_range("0", 0, 1000), Some(0));
        assert_eq!(parse_u32_range("1001", 0, 1000), None);
        assert_eq!(parse_u32_range("-1", 0, 1000), None);
    }
}
