//! The minimal signal envelope the runtime reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A typed event describing agent activity. Only `type` and `payload` are read;
/// any richer envelope fields are ignored on deserialization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSignal {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Map<String, JsonValue>,
}

impl PerformanceSignal {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Build a signal from a JSON payload. Non-object payloads become an empty payload.
    pub fn with_payload(kind: impl Into<String>, payload: JsonValue) -> Self {
        let payload = match payload {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Builder-style insert of a single payload field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}
