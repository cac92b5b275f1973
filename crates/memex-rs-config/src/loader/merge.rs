//! Merging of memex config layers.
//!
//! Layers are canonicalized to snake_case keys first, so a user layer written
//! with `recallThreshold` and a project layer with `recall_threshold` override
//! each other instead of colliding. Objects merge key by key and scalars are
//! replaced, except for `engine.sensitivity_patterns`, which accumulates across
//! layers so a project can add detectors without dropping the user's. Keys set
//! by the requirements layer are locked.

use super::schema::{invalid_field, join_path};
use crate::ConfigError;
use log::warn;
use serde_json::{Map, Value};

/// camelCase spellings accepted per block, with their canonical key.
const KEY_ALIASES: &[(&str, &str, &str)] = &[
    ("engine", "recallThreshold", "recall_threshold"),
    ("engine", "writeThreshold", "write_threshold"),
    ("engine", "ttl", "ttl_days"),
    ("engine", "autoMaskSensitive", "auto_mask_sensitive"),
    ("engine", "sensitivityPatterns", "sensitivity_patterns"),
    ("engine", "platformWeight", "platform_weight"),
    ("recall", "halfLifeDays", "half_life_days"),
    ("recall", "touchOnRecall", "touch_on_recall"),
    ("recall.weights", "typePriority", "type_priority"),
    ("storage", "warmAfterDays", "warm_after_days"),
    ("storage", "coldAfterDays", "cold_after_days"),
];

/// Lists that union across layers instead of being replaced.
const ACCUMULATED_LISTS: &[&str] = &["engine.sensitivity_patterns"];

/// Rewrite alias keys in a schema-valid layer to their canonical names.
///
/// Setting both spellings of one key in the same layer is rejected.
pub(super) fn canonicalize_keys(value: &mut Value, layer: &str) -> Result<(), ConfigError> {
    for (block, alias, canonical) in KEY_ALIASES {
        let Some(map) = block_mut(value, block) else {
            continue;
        };
        let Some(aliased) = map.remove(*alias) else {
            continue;
        };
        if map.contains_key(*canonical) {
            return Err(invalid_field(
                layer,
                &join_path(block, alias),
                &format!("duplicates {}", join_path(block, canonical)),
            ));
        }
        map.insert((*canonical).to_string(), aliased);
    }
    Ok(())
}

fn block_mut<'a>(value: &'a mut Value, block: &str) -> Option<&'a mut Map<String, Value>> {
    block
        .split('.')
        .try_fold(value, |current, key| current.get_mut(key))
        .and_then(Value::as_object_mut)
}

/// Effective document being built from the layer stack.
#[derive(Debug)]
pub(super) struct LayerMerge {
    merged: Value,
    locks: Value,
    /// Dotted paths of overrides dropped because requirements lock them.
    ignored: Vec<String>,
}

impl LayerMerge {
    /// Start from the requirements layer; its keys are locked for every later layer.
    pub(super) fn new(requirements: Option<Value>) -> Self {
        let locks = requirements.unwrap_or_else(|| Value::Object(Map::new()));
        Self {
            merged: locks.clone(),
            locks,
            ignored: Vec::new(),
        }
    }

    /// Fold one layer into the effective document.
    pub(super) fn apply(&mut self, layer: &Value, label: &str) {
        merge_into(
            &mut self.merged,
            layer,
            Some(&self.locks),
            "",
            label,
            &mut self.ignored,
        );
    }

    pub(super) fn finish(self) -> (Value, Vec<String>) {
        (self.merged, self.ignored)
    }
}

fn merge_into(
    base: &mut Value,
    overlay: &Value,
    locks: Option<&Value>,
    path: &str,
    label: &str,
    ignored: &mut Vec<String>,
) {
    let Some(overlay_map) = overlay.as_object() else {
        *base = overlay.clone();
        return;
    };
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    let Some(base_map) = base.as_object_mut() else {
        return;
    };
    for (key, value) in overlay_map {
        let key_path = join_path(path, key);
        let lock = locks.and_then(|locks| locks.get(key));
        if lock.is_some_and(|lock| !lock.is_object()) {
            warn!("locked config key not overridden (path={key_path}, layer={label})");
            ignored.push(key_path);
            continue;
        }
        let slot = base_map.entry(key.clone()).or_insert(Value::Null);
        if ACCUMULATED_LISTS.contains(&key_path.as_str()) {
            accumulate(slot, value);
        } else if value.is_object() {
            merge_into(slot, value, lock, &key_path, label, ignored);
        } else {
            *slot = value.clone();
        }
    }
}

/// Append the overlay's entries that the list does not already hold.
fn accumulate(slot: &mut Value, overlay: &Value) {
    let Value::Array(additions) = overlay else {
        *slot = overlay.clone();
        return;
    };
    match slot {
        Value::Array(existing) => {
            for item in additions {
                if !existing.contains(item) {
                    existing.push(item.clone());
                }
            }
        }
        _ => *slot = overlay.clone(),
    }
}
