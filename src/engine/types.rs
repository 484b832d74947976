//! Engine types
//!
//! Message types and configuration for the extraction engine.

use crate::partition::Partition;
use crate::state::CursorState;
use crate::types::{LogLevel, Record};
use serde::Serialize;
use serde_json::Value;

/// A message emitted during extraction, in extraction order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// Partition the record was read from
        partition: Partition,
        /// The record
        data: Record,
    },
    /// Cursor checkpoint
    State {
        /// Stream name
        stream: String,
        /// Cursor state snapshot
        data: CursorState,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, partition: Partition, data: Record) -> Self {
        Self::Record {
            stream: stream.into(),
            partition,
            data,
        }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, data: CursorState) -> Self {
        Self::State {
            stream: stream.into(),
            data,
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }

    /// Record payload, if this is a record message
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record { data, .. } => Some(data),
            _ => None,
        }
    }

    /// JSON form written by the CLI, one object per line
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Configuration for a read
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Propagate partition-scoped failures instead of moving on
    pub fail_fast: bool,
    /// Emit a state message every N records (overrides the stream's setting)
    pub checkpoint_interval: Option<usize>,
    /// Stop after this many records
    pub max_records: Option<usize>,
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fail fast mode
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set the checkpoint interval
    #[must_use]
    pub fn with_checkpoint_interval(mut self, every: usize) -> Self {
        self.checkpoint_interval = Some(every);
        self
    }

    /// Set max records
    #[must_use]
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }
}

/// Statistics from a read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records emitted
    pub records_synced: usize,
    /// Total pages fetched
    pub pages_fetched: usize,
    /// Partitions read to completion
    pub partitions_synced: usize,
    /// Partitions abandoned after an error
    pub errors: usize,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record
    pub fn add_record(&mut self) {
        self.records_synced += 1;
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a partition
    pub fn add_partition(&mut self) {
        self.partitions_synced += 1;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }
}
