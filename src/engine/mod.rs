//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Extractor` - Holds the stream definitions and builds readers
//! - `RecordReader` - Pull-based read of one stream
//! - `Stream` - Runtime stream definition
//! - Message types for output (Record, State, Log)

mod reader;
mod stream;
mod types;

pub use reader::RecordReader;
pub use stream::{
    ArchivedSpec, IncrementalSpec, PartitionSpec, RequestSpec, Stream, DEFAULT_ARCHIVED_FILTER,
    DEFAULT_FILTER_PARAM,
};
pub use types::{Message, SyncConfig, SyncStats};

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::partition::{ListRouter, ParentRouter, PartitionRouter, SinglePartition};
use crate::state::CursorState;
use crate::types::SyncMode;
use serde_json::Value;
use std::sync::Arc;

/// Builds readers over a set of streams sharing one HTTP client
#[derive(Debug, Clone)]
pub struct Extractor {
    /// Streams in definition order
    streams: Vec<Arc<Stream>>,
    /// HTTP client
    client: HttpClient,
    /// Runtime configuration visible to templates as `config`
    config: Value,
    /// Read options
    sync: SyncConfig,
}

impl Extractor {
    /// Create a new extractor
    pub fn new(client: HttpClient, config: Value) -> Self {
        Self {
            streams: Vec::new(),
            client,
            config,
            sync: SyncConfig::default(),
        }
    }

    /// Set read options
    #[must_use]
    pub fn with_sync_config(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Register a stream
    #[must_use]
    pub fn with_stream(mut self, stream: impl Into<Arc<Stream>>) -> Self {
        self.streams.push(stream.into());
        self
    }

    /// Registered streams
    pub fn streams(&self) -> &[Arc<Stream>] {
        &self.streams
    }

    /// Look up a stream by name
    pub fn stream(&self, name: &str) -> Option<&Arc<Stream>> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Read a stream by name, resuming from `state`
    pub fn read(&self, name: &str, state: Option<CursorState>) -> Result<RecordReader> {
        let stream = self.stream(name).ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })?;

        let mode = if stream.is_incremental() {
            SyncMode::Incremental
        } else {
            SyncMode::FullRefresh
        };

        Ok(self.reader(stream.clone(), state.unwrap_or_default(), mode, self.sync.clone()))
    }

    /// Build a reader for any stream, including ones not registered
    pub fn reader(
        &self,
        stream: Arc<Stream>,
        cursor: CursorState,
        mode: SyncMode,
        sync: SyncConfig,
    ) -> RecordReader {
        let router = self.router(&stream);
        RecordReader::new(stream, self.client.clone(), self.config.clone(), router, cursor, mode)
            .with_sync_config(sync)
    }

    /// Partition router for a stream; parents are read in full refresh
    fn router(&self, stream: &Stream) -> Box<dyn PartitionRouter> {
        match &stream.partition {
            PartitionSpec::None => Box::new(SinglePartition::new()),
            PartitionSpec::List {
                values,
                partition_field,
            } => Box::new(ListRouter::new(values.clone(), partition_field.clone())),
            PartitionSpec::Parent {
                parent,
                field_path,
                partition_field,
                label,
            } => {
                let parent_sync = SyncConfig {
                    fail_fast: self.sync.fail_fast,
                    ..SyncConfig::default()
                };
                let parent_reader = self.reader(
                    parent.clone(),
                    CursorState::new(),
                    SyncMode::FullRefresh,
                    parent_sync,
                );

                let mut router = ParentRouter::new(
                    Box::new(parent_reader),
                    parent.name.clone(),
                    field_path.clone(),
                    partition_field.clone(),
                );
                if let Some((key, path)) = label {
                    router = router.with_label(key.clone(), path.clone());
                }
                Box::new(router)
            }
        }
    }
}

#[cfg(test)]
mod tests;
