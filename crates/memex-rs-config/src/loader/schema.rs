//! Schema validation helpers for memex JSON5 configuration.

use super::SchemaMode;
use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(
    value: &Value,
    _mode: SchemaMode,
    layer: &str,
) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &["$schema", "engine", "recall", "storage", "audit"],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("engine") {
        validate_engine(value, layer, "engine")?;
    }
    if let Some(value) = map.get("recall") {
        validate_recall(value, layer, "recall")?;
    }
    if let Some(value) = map.get("storage") {
        validate_storage(value, layer, "storage")?;
    }
    if let Some(value) = map.get("audit") {
        validate_audit(value, layer, "audit")?;
    }
    Ok(())
}

/// Validate the "engine" block.
fn validate_engine(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "gamma",
        "barrier",
        "recall_threshold",
        "recallThreshold",
        "write_threshold",
        "writeThreshold",
        "platform",
        "namespace",
        "budget",
        "ttl_days",
        "ttl",
        "auto_mask_sensitive",
        "autoMaskSensitive",
        "sensitivity_patterns",
        "sensitivityPatterns",
        "platform_weight",
        "platformWeight",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    for key in [
        "gamma",
        "barrier",
        "recall_threshold",
        "recallThreshold",
        "write_threshold",
        "writeThreshold",
        "platform_weight",
        "platformWeight",
    ] {
        if let Some(value) = map.get(key) {
            expect_f64(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["platform", "namespace"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["ttl_days", "ttl"] {
        if let Some(value) = map.get(key)
            && !value.is_null()
        {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["auto_mask_sensitive", "autoMaskSensitive"] {
        if let Some(value) = map.get(key) {
            expect_bool(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["sensitivity_patterns", "sensitivityPatterns"] {
        if let Some(value) = map.get(key) {
            validate_string_array(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("budget") {
        validate_budget(value, layer, &join_path(path, "budget"))?;
    }
    Ok(())
}

/// Validate per-type budget caps.
fn validate_budget(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["pinned", "persona", "core", "episodic"], layer, path)?;

    if let Some(value) = map.get("pinned")
        && !value.is_null()
    {
        expect_u64(value, layer, &join_path(path, "pinned"))?;
    }
    for key in ["persona", "core", "episodic"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "recall" block.
fn validate_recall(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "half_life_days",
        "halfLifeDays",
        "weights",
        "semantic",
        "touch_on_recall",
        "touchOnRecall",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    for key in ["half_life_days", "halfLifeDays"] {
        if let Some(value) = map.get(key) {
            expect_f64(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["semantic", "touch_on_recall", "touchOnRecall"] {
        if let Some(value) = map.get(key) {
            expect_bool(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("weights") {
        let weights_path = join_path(path, "weights");
        let weights = expect_object(value, layer, &weights_path)?;
        let keys = [
            "keyword",
            "priority",
            "recency",
            "platform",
            "type_priority",
            "typePriority",
        ];
        ensure_allowed_keys(weights, &keys, layer, &weights_path)?;
        for key in keys {
            if let Some(value) = weights.get(key) {
                expect_f64(value, layer, &join_path(&weights_path, key))?;
            }
        }
    }
    Ok(())
}

/// Validate the "storage" block.
fn validate_storage(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "backend",
        "path",
        "tiered",
        "warm_after_days",
        "warmAfterDays",
        "cold_after_days",
        "coldAfterDays",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    if let Some(value) = map.get("backend") {
        validate_storage_backend(value, layer, &join_path(path, "backend"))?;
    }
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    if let Some(value) = map.get("tiered") {
        expect_bool(value, layer, &join_path(path, "tiered"))?;
    }
    for key in [
        "warm_after_days",
        "warmAfterDays",
        "cold_after_days",
        "coldAfterDays",
    ] {
        if let Some(value) = map.get(key) {
            expect_f64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate storage backend values.
fn validate_storage_backend(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Some(backend) = value.as_str() else {
        return Err(invalid_field(layer, path, "expected string"));
    };
    if matches!(backend, "file" | "memory") {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "invalid storage backend"))
    }
}

/// Validate the "audit" block.
fn validate_audit(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["enabled", "path"], layer, path)?;

    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a JSON boolean or return a typed error.
fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative JSON integer.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a JSON number or return a typed error.
fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Validate that a value is an array of strings.
fn validate_string_array(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Value::Array(arr) = value else {
        return Err(invalid_field(layer, path, "expected array"));
    };
    for (idx, entry) in arr.iter().enumerate() {
        if entry.as_str().is_none() {
            return Err(invalid_field(
                layer,
                &format!("{path}[{idx}]"),
                "expected string",
            ));
        }
    }
    Ok(())
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
pub(super) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
pub(super) fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
