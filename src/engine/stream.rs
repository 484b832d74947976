//! Runtime stream definitions
//!
//! A [`Stream`] bundles everything the reader needs for one endpoint. Its
//! pagination, cursor and partition strategies are attached as values, so any
//! combination can be configured without new types.

use crate::decode::{JsonDecoder, RecordDecoder};
use crate::pagination::{NoPaginator, Paginator};
use crate::state::CursorManager;
use crate::types::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default query parameter carrying filter clauses
pub const DEFAULT_FILTER_PARAM: &str = "filter";

/// Default filter clause of the archived pass
pub const DEFAULT_ARCHIVED_FILTER: &str = "equals(archived,true)";

/// Request template for one stream
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// HTTP method
    pub method: Method,
    /// Path (templated), joined to the client's base URL
    pub path: String,
    /// Query parameters (templated)
    pub params: BTreeMap<String, String>,
    /// Static filter clauses (templated), joined with the cursor clause
    pub filters: Vec<String>,
    /// Query parameter receiving the joined filter clauses
    pub filter_param: String,
    /// Extra headers (templated)
    pub headers: BTreeMap<String, String>,
    /// JSON body (templated)
    pub body: Option<Value>,
}

impl RequestSpec {
    /// GET request for a path
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            params: BTreeMap::new(),
            filters: Vec::new(),
            filter_param: DEFAULT_FILTER_PARAM.to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// Cursor handling for an incremental stream
#[derive(Debug, Clone)]
pub struct IncrementalSpec {
    /// Cursor rules
    pub cursor: CursorManager,
    /// Nested path lifted to the top-level cursor field before advancing
    pub cursor_path: Option<String>,
    /// Sort parameter `(name, value)` sent on the first page
    pub sort: Option<(String, String)>,
}

impl IncrementalSpec {
    /// Incremental handling with the given cursor rules
    pub fn new(cursor: CursorManager) -> Self {
        Self {
            cursor,
            cursor_path: None,
            sort: None,
        }
    }

    /// Lift the cursor from a nested path
    #[must_use]
    pub fn with_cursor_path(mut self, path: impl Into<String>) -> Self {
        self.cursor_path = Some(path.into());
        self
    }

    /// Sort ascending by the cursor
    #[must_use]
    pub fn with_sort(mut self, param: impl Into<String>, value: impl Into<String>) -> Self {
        self.sort = Some((param.into(), value.into()));
        self
    }
}

/// Secondary pass reading archived records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSpec {
    /// Filter clause selecting archived records
    pub filter: String,
}

impl Default for ArchivedSpec {
    fn default() -> Self {
        Self {
            filter: DEFAULT_ARCHIVED_FILTER.to_string(),
        }
    }
}

/// How a stream's partitions are produced
#[derive(Debug, Clone, Default)]
pub enum PartitionSpec {
    /// Single default partition
    #[default]
    None,
    /// Static list of values
    List {
        values: Vec<Value>,
        partition_field: String,
    },
    /// One partition per usable parent record
    Parent {
        parent: Arc<Stream>,
        field_path: String,
        partition_field: String,
        label: Option<(String, String)>,
    },
}

/// A fully resolved stream
#[derive(Debug, Clone)]
pub struct Stream {
    /// Stream name
    pub name: String,
    /// Request template
    pub request: RequestSpec,
    /// Record extraction
    pub decoder: Arc<dyn RecordDecoder>,
    /// Primary key fields
    pub primary_key: Vec<String>,
    /// Pagination strategy
    pub paginator: Arc<dyn Paginator>,
    /// Cursor handling; `None` for full-refresh streams
    pub incremental: Option<IncrementalSpec>,
    /// Partition strategy
    pub partition: PartitionSpec,
    /// Secondary archived pass
    pub archived: Option<ArchivedSpec>,
    /// Emit a state message every N records
    pub checkpoint_interval: Option<usize>,
}

impl Stream {
    /// Single-page, full-refresh GET stream
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request: RequestSpec::get(path),
            decoder: Arc::new(JsonDecoder::new()),
            primary_key: Vec::new(),
            paginator: Arc::new(NoPaginator),
            incremental: None,
            partition: PartitionSpec::None,
            archived: None,
            checkpoint_interval: None,
        }
    }

    /// Set the request template
    #[must_use]
    pub fn with_request(mut self, request: RequestSpec) -> Self {
        self.request = request;
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.insert(key.into(), value.into());
        self
    }

    /// Add a static filter clause
    #[must_use]
    pub fn with_filter(mut self, clause: impl Into<String>) -> Self {
        self.request.filters.push(clause.into());
        self
    }

    /// Extract records from a path in the response
    #[must_use]
    pub fn with_records_path(mut self, path: impl Into<String>) -> Self {
        self.decoder = Arc::new(JsonDecoder::with_path(path));
        self
    }

    /// Set the primary key
    #[must_use]
    pub fn with_primary_key(mut self, fields: Vec<String>) -> Self {
        self.primary_key = fields;
        self
    }

    /// Set the pagination strategy
    #[must_use]
    pub fn with_paginator(mut self, paginator: Arc<dyn Paginator>) -> Self {
        self.paginator = paginator;
        self
    }

    /// Make the stream incremental
    #[must_use]
    pub fn with_incremental(mut self, incremental: IncrementalSpec) -> Self {
        self.incremental = Some(incremental);
        self
    }

    /// Set the partition strategy
    #[must_use]
    pub fn with_partition(mut self, partition: PartitionSpec) -> Self {
        self.partition = partition;
        self
    }

    /// Enable the archived pass
    #[must_use]
    pub fn with_archived(mut self, archived: ArchivedSpec) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Emit a state message every N records
    #[must_use]
    pub fn with_checkpoint_interval(mut self, every: usize) -> Self {
        self.checkpoint_interval = Some(every);
        self
    }

    /// Whether the stream tracks a cursor
    pub fn is_incremental(&self) -> bool {
        self.incremental.is_some()
    }

    /// Parent stream, if partitioned by one
    pub fn parent(&self) -> Option<&Arc<Stream>> {
        match &self.partition {
            PartitionSpec::Parent { parent, .. } => Some(parent),
            _ => None,
        }
    }
}
