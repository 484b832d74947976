//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs. A stream's
//! cursor state is a flat map of cursor field to value, with records of the
//! secondary class tracked under a nested `archived` map:
//!
//! ```json
//! {"updated": "2024-01-05T00:00:00Z", "archived": {"updated": "2023-11-02T08:00:00Z"}}
//! ```

use crate::types::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Complete state for a connector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream cursor state
    #[serde(default)]
    pub streams: HashMap<String, CursorState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&CursorState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut CursorState {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Replace a stream's state
    pub fn set_stream(&mut self, stream: &str, state: CursorState) {
        self.streams.insert(stream.to_string(), state);
    }
}

/// Which cursor marker a record advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    /// Regular records
    #[default]
    Primary,
    /// Records flagged as archived
    Archived,
}

/// Cursor state for a single stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    /// Secondary namespace, kept apart so the two markers never overwrite each other
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<JsonObject>,

    /// Primary namespace: cursor field -> value
    #[serde(flatten)]
    pub values: JsonObject,
}

impl CursorState {
    /// Create a new empty cursor state
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether any marker has been recorded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.archived.as_ref().map_or(true, JsonObject::is_empty)
    }

    /// Get a marker
    pub fn get(&self, namespace: Namespace, field: &str) -> Option<&Value> {
        match namespace {
            Namespace::Primary => self.values.get(field),
            Namespace::Archived => self.archived.as_ref()?.get(field),
        }
    }

    /// Set a marker
    pub fn set(&mut self, namespace: Namespace, field: &str, value: Value) {
        let map = match namespace {
            Namespace::Primary => &mut self.values,
            Namespace::Archived => self.archived.get_or_insert_with(JsonObject::new),
        };
        map.insert(field.to_string(), value);
    }

    /// Serialize to a plain JSON object
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(JsonObject::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.streams.is_empty());
        assert!(state.get_stream("flows").is_none());
    }

    #[test]
    fn test_namespaces_are_separate() {
        let mut cursor = CursorState::new();
        cursor.set(Namespace::Primary, "updated", json!("2024-01-05T00:00:00Z"));
        cursor.set(Namespace::Archived, "updated", json!("2023-11-02T08:00:00Z"));

        assert_eq!(
            cursor.get(Namespace::Primary, "updated"),
            Some(&json!("2024-01-05T00:00:00Z"))
        );
        assert_eq!(
            cursor.get(Namespace::Archived, "updated"),
            Some(&json!("2023-11-02T08:00:00Z"))
        );
    }

    #[test]
    fn test_cursor_state_wire_shape() {
        let mut cursor = CursorState::new();
        cursor.set(Namespace::Primary, "updated", json!("2024-01-05T00:00:00Z"));
        cursor.set(Namespace::Archived, "updated", json!("2023-11-02T08:00:00Z"));

        assert_eq!(
            cursor.to_value(),
            json!({
                "updated": "2024-01-05T00:00:00Z",
                "archived": {"updated": "2023-11-02T08:00:00Z"}
            })
        );
    }

    #[test]
    fn test_cursor_state_without_archived() {
        let mut cursor = CursorState::new();
        assert!(cursor.is_empty());
        cursor.set(Namespace::Primary, "seq", json!(42));
        assert_eq!(cursor.to_value(), json!({"seq": 42}));
        assert!(!cursor.is_empty());
    }

    #[test]
    fn test_state_roundtrip() {
        let raw = json!({
            "streams": {
                "flows": {"updated": "2024-01-01T00:00:00Z", "archived": {"updated": "2023-01-01T00:00:00Z"}},
                "engage": {}
            }
        });

        let state: State = serde_json::from_value(raw.clone()).unwrap();
        let flows = state.get_stream("flows").unwrap();
        assert_eq!(
            flows.get(Namespace::Archived, "updated"),
            Some(&json!("2023-01-01T00:00:00Z"))
        );
        assert!(flows.values.get("archived").is_none());
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }
}
