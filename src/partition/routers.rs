//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{ParentSource, Partition, PartitionRouter, PARENT_SLICE_KEY};
use crate::engine::Message;
use crate::error::Result;
use crate::types::{lookup_record, LogLevel, Record};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, event, Level};

// ============================================================================
// Single Partition
// ============================================================================

/// Yields the default partition once
#[derive(Debug, Default)]
pub struct SinglePartition {
    emitted: bool,
}

impl SinglePartition {
    /// Create a new single-partition router
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PartitionRouter for SinglePartition {
    async fn next_partition(&mut self) -> Result<Option<Partition>> {
        if self.emitted {
            return Ok(None);
        }
        self.emitted = true;
        Ok(Some(Partition::new()))
    }
}

// ============================================================================
// List Router
// ============================================================================

/// List-based partition router
///
/// Creates partitions from a static list of values.
#[derive(Debug, Clone)]
pub struct ListRouter {
    /// List of partition values
    values: Vec<Value>,
    /// Field name for partition
    partition_field: String,
    position: usize,
}

impl ListRouter {
    /// Create a new list router
    pub fn new(values: Vec<Value>, partition_field: impl Into<String>) -> Self {
        Self {
            values,
            partition_field: partition_field.into(),
            position: 0,
        }
    }
}

#[async_trait]
impl PartitionRouter for ListRouter {
    async fn next_partition(&mut self) -> Result<Option<Partition>> {
        let Some(value) = self.values.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(
            Partition::new().with_value(self.partition_field.clone(), value.clone()),
        ))
    }
}

// ============================================================================
// Parent Router
// ============================================================================

/// Parent stream-based partition router
///
/// Pulls the parent's records one at a time and projects each into a child
/// partition. Records without the projected field are skipped; the parent's
/// state and log messages never become partitions.
pub struct ParentRouter {
    /// Reader over the parent stream
    parent: Box<dyn ParentSource>,
    /// Parent stream name, for logging
    parent_stream: String,
    /// Dotted path read from each parent record
    field_path: String,
    /// Field name for partition
    partition_field: String,
    /// Optional `(key, path)` copied alongside the value
    label: Option<(String, String)>,
}

impl ParentRouter {
    /// Create a new parent router
    pub fn new(
        parent: Box<dyn ParentSource>,
        parent_stream: impl Into<String>,
        field_path: impl Into<String>,
        partition_field: impl Into<String>,
    ) -> Self {
        Self {
            parent,
            parent_stream: parent_stream.into(),
            field_path: field_path.into(),
            partition_field: partition_field.into(),
            label: None,
        }
    }

    /// Copy a second value (e.g. a display name) from each parent record
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.label = Some((key.into(), path.into()));
        self
    }

    fn project(&self, parent_partition: &Partition, record: &Record) -> Option<Partition> {
        let value = match lookup_record(record, &self.field_path) {
            None | Some(Value::Null) => return None,
            Some(value) => value.clone(),
        };

        let mut partition = Partition::new().with_value(self.partition_field.clone(), value);
        if let Some((key, path)) = &self.label {
            if let Some(label) = lookup_record(record, path) {
                partition.insert(key.clone(), label.clone());
            }
        }
        partition.insert(PARENT_SLICE_KEY, parent_partition.to_value());
        Some(partition)
    }
}

impl std::fmt::Debug for ParentRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentRouter")
            .field("parent_stream", &self.parent_stream)
            .field("field_path", &self.field_path)
            .field("partition_field", &self.partition_field)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PartitionRouter for ParentRouter {
    async fn next_partition(&mut self) -> Result<Option<Partition>> {
        while let Some(message) = self.parent.next_message().await? {
            match message {
                Message::Record {
                    partition, data, ..
                } => {
                    if let Some(child) = self.project(&partition, &data) {
                        return Ok(Some(child));
                    }
                    debug!(
                        parent = %self.parent_stream,
                        field = %self.field_path,
                        "Parent record missing partition field, skipping"
                    );
                }
                Message::Log { level, message } => relog(&self.parent_stream, level, &message),
                Message::State { .. } => {}
            }
        }
        Ok(None)
    }
}

/// Surface a parent's log message through tracing
fn relog(parent: &str, level: LogLevel, message: &str) {
    match level {
        LogLevel::Error => event!(Level::ERROR, parent = %parent, "{message}"),
        LogLevel::Warn => event!(Level::WARN, parent = %parent, "{message}"),
        LogLevel::Info => event!(Level::INFO, parent = %parent, "{message}"),
        LogLevel::Debug => event!(Level::DEBUG, parent = %parent, "{message}"),
        LogLevel::Trace => event!(Level::TRACE, parent = %parent, "{message}"),
    }
}
