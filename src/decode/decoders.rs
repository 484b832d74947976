//! Decoder implementations

use crate::error::{Error, Result};
use crate::types::{lookup_path, Record};
use serde_json::Value;
use tracing::warn;

/// Extracts records from a decoded response body
pub trait RecordDecoder: Send + Sync + std::fmt::Debug {
    /// Records contained in one page
    fn decode(&self, body: &Value) -> Result<Vec<Record>>;
}

// ============================================================================
// JSON Decoder
// ============================================================================

/// JSON decoder with optional record path extraction
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    /// Path to the records inside the envelope
    record_path: Option<String>,
}

impl JsonDecoder {
    /// Create a JSON decoder treating the whole body as records
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            record_path: Some(path.into()),
        }
    }

    /// Extract the raw values under the record path
    fn extract_values(&self, body: &Value) -> Result<Vec<Value>> {
        let selected = match &self.record_path {
            None => body.clone(),
            Some(path) if path.contains('*') || path.contains('[') => {
                extract_with_jsonpath(body, path)?
            }
            Some(path) => lookup_path(body, path).cloned().unwrap_or(Value::Null),
        };

        Ok(match selected {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &Value) -> Result<Vec<Record>> {
        let values = self.extract_values(body)?;
        let mut records = Vec::with_capacity(values.len());

        for value in values {
            match value {
                Value::Object(record) => records.push(record),
                other => warn!(value = %other, "Skipping non-object record"),
            }
        }

        Ok(records)
    }
}

/// Extract using jsonpath-rust for wildcard/index expressions
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Value> {
    use jsonpath_rust::JsonPath;

    let path = if path.starts_with('$') {
        path.to_string()
    } else {
        format!("$.{path}")
    };

    let jp = JsonPath::try_from(path.as_str())
        .map_err(|e| Error::json_path(format!("Invalid JSONPath '{path}': {e}")))?;

    Ok(jp.find(value))
}
