//! `signal.*` reference resolution for step parameters and entity targets.
//!
//! A string beginning with `signal.` is a reference: `signal.type` reads the
//! envelope type, anything else is a dot path into the payload. Every
//! intermediate segment must exist and be an object; otherwise the lookup
//! misses (`None`). Non-reference values pass through untouched.

use serde_json::{Map, Value as JsonValue};

use crate::signal::PerformanceSignal;

/// Reserved reference prefix.
pub const SIGNAL_PREFIX: &str = "signal.";

#[inline]
pub fn is_signal_ref(s: &str) -> bool {
    s.starts_with(SIGNAL_PREFIX)
}

/// Walk a dot path through nested payload objects.
pub fn lookup_path<'a>(payload: &'a Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = payload.get(first)?;
    for seg in segments {
        current = current.as_object()?.get(seg)?;
    }
    Some(current)
}

/// Resolve a `signal.*` reference against a signal. Returns `None` for a miss or
/// when `reference` is not a signal reference at all.
pub fn resolve_signal_ref(reference: &str, signal: &PerformanceSignal) -> Option<JsonValue> {
    let path = reference.strip_prefix(SIGNAL_PREFIX)?;
    if path == "type" {
        return Some(JsonValue::String(signal.kind.clone()));
    }
    lookup_path(&signal.payload, path).cloned()
}

/// Resolve a single value; misses become `null`.
pub fn resolve_value(value: &JsonValue, signal: &PerformanceSignal) -> JsonValue {
    match value {
        JsonValue::String(s) if is_signal_ref(s) => {
            resolve_signal_ref(s, signal).unwrap_or(JsonValue::Null)
        }
        JsonValue::Object(map) => JsonValue::Object(resolve_params(map, signal)),
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|v| resolve_value(v, signal)).collect())
        }
        other => other.clone(),
    }
}

/// Return a new bag with every `signal.*` string replaced by its resolved value.
/// Misses resolve to `null`. Nested objects and arrays are walked.
pub fn resolve_params(
    params: &Map<String, JsonValue>,
    signal: &PerformanceSignal,
) -> Map<String, JsonValue> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, signal)))
        .collect()
}

/// Resolve a step's entity target. References that resolve to a non-string (or
/// miss) become the empty string; anything else is a literal entity name.
pub fn resolve_entity_ref(target: &str, signal: &PerformanceSignal) -> String {
    if !is_signal_ref(target) {
        return target.to_string();
    }
    match resolve_signal_ref(target, signal) {
        Some(JsonValue::String(s)) => s,
        _ => String::new(),
    }
}
