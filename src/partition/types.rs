//! Partition types and traits
//!
//! A partition is one slice of a stream's key space: a small map of values
//! that templates can reference as `{{ partition.<key> }}`. The default
//! partition is empty.

use crate::engine::Message;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key under which a child partition records the parent's partition
pub const PARENT_SLICE_KEY: &str = "parent_slice";

/// Identity of the default partition
pub const DEFAULT_PARTITION_ID: &str = "default";

/// A partition definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition {
    values: BTreeMap<String, Value>,
}

impl Partition {
    /// Create the empty (default) partition
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The parent partition this one was derived from, if any
    pub fn parent_slice(&self) -> Option<&Value> {
        self.values.get(PARENT_SLICE_KEY)
    }

    /// Whether this is the default partition
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values as a JSON object, for template contexts and back-references
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Stable identifier used in logs
    pub fn id(&self) -> String {
        if self.values.is_empty() {
            DEFAULT_PARTITION_ID.to_string()
        } else {
            self.to_value().to_string()
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

/// Configuration for partition routing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionConfig {
    /// No partitioning
    #[default]
    None,

    /// Partition based on a static list
    List {
        /// List of values
        values: Vec<Value>,
        /// Field name to use in partitions
        partition_field: String,
    },

    /// Partition based on parent stream records
    Parent {
        /// Name of the parent stream
        parent_stream: String,
        /// Dotted path of the value read from each parent record
        field_path: String,
        /// Field name to use in partitions
        partition_field: String,
        /// Optional extra key copied from the parent record
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label_field: Option<String>,
        /// Dotted path of the label value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label_path: Option<String>,
    },
}

impl PartitionConfig {
    /// Create list-based partition config
    pub fn list(values: Vec<Value>, partition_field: impl Into<String>) -> Self {
        Self::List {
            values,
            partition_field: partition_field.into(),
        }
    }

    /// Create parent-based partition config
    pub fn parent(
        parent_stream: impl Into<String>,
        field_path: impl Into<String>,
        partition_field: impl Into<String>,
    ) -> Self {
        Self::Parent {
            parent_stream: parent_stream.into(),
            field_path: field_path.into(),
            partition_field: partition_field.into(),
            label_field: None,
            label_path: None,
        }
    }

    /// Parent stream this config depends on
    pub fn parent_stream(&self) -> Option<&str> {
        match self {
            Self::Parent { parent_stream, .. } => Some(parent_stream),
            _ => None,
        }
    }
}

/// A lazy, finite, non-restartable sequence of partitions
#[async_trait]
pub trait PartitionRouter: Send {
    /// Next partition, or `None` once exhausted
    async fn next_partition(&mut self) -> Result<Option<Partition>>;
}

/// Source of parent stream messages for [`ParentRouter`](super::ParentRouter)
#[async_trait]
pub trait ParentSource: Send {
    /// Next message from the parent read, or `None` once exhausted
    async fn next_message(&mut self) -> Result<Option<Message>>;
}
