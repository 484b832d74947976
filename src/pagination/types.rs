//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use super::strategies::{LinkCursorPaginator, NoPaginator, PageSessionPaginator};
use crate::types::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Request parameters that fetch the next page
///
/// Sorted so that two tokens compare equal regardless of the order the
/// provider emitted the parameters in.
pub type PaginationToken = BTreeMap<String, String>;

/// Tracks pagination state during one partition's iteration
///
/// Created fresh for every partition; nothing here outlives it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    /// Pages fetched so far
    pub pages: u32,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Token issued for the page currently being fetched
    pub last_token: Option<PaginationToken>,
    /// Every token issued for this partition
    pub issued: HashSet<PaginationToken>,
    /// Last page index reported by the provider
    pub last_page: Option<u64>,
    /// Result-set size reported on the first page
    pub total: Option<u64>,
    /// Server-side session reported on the first page
    pub session_id: Option<String>,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a fetched page
    pub fn record_page(&mut self, records: usize) {
        self.pages += 1;
        self.total_fetched += records as u64;
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Record `token` as issued; `None` (and done) if it was issued before
    pub fn issue(&mut self, token: PaginationToken) -> Option<PaginationToken> {
        if !self.issued.insert(token.clone()) {
            self.mark_done();
            return None;
        }
        self.last_token = Some(token.clone());
        Some(token)
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Static parameters sent when no token is present
    fn initial_params(&self) -> PaginationToken;

    /// Decide whether another page exists and which parameters fetch it.
    ///
    /// `None` means the partition is exhausted.
    fn next_token(
        &self,
        body: &Value,
        records: &[Record],
        state: &mut PaginationState,
    ) -> Option<PaginationToken>;
}

/// Configuration for pagination behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfig {
    /// Single request per partition
    #[default]
    None,

    /// Follow a next link carried in the response envelope
    LinkCursor {
        /// Dotted path of the next link (default `links.next`)
        #[serde(default = "default_next_path")]
        next_path: String,
        /// Page size parameter sent on the first request
        #[serde(default)]
        page_size_param: Option<String>,
        /// Page size value
        #[serde(default)]
        page_size: Option<u32>,
    },

    /// Page index plus server-side session, bounded by a first-page total
    PageSession {
        /// Records per page the provider returns
        page_size: u64,
        /// Response field carrying the page index
        #[serde(default = "default_page_field")]
        page_field: String,
        /// Response field carrying the total
        #[serde(default = "default_total_field")]
        total_field: String,
        /// Response field carrying the session id
        #[serde(default = "default_session_field")]
        session_field: String,
        /// Optional parameter that requests the page size explicitly
        #[serde(default)]
        page_size_param: Option<String>,
    },
}

fn default_next_path() -> String {
    "links.next".to_string()
}

fn default_page_field() -> String {
    "page".to_string()
}

fn default_total_field() -> String {
    "total".to_string()
}

fn default_session_field() -> String {
    "session_id".to_string()
}

impl PaginationConfig {
    /// Link-cursor pagination on `links.next`
    pub fn link_cursor() -> Self {
        Self::LinkCursor {
            next_path: default_next_path(),
            page_size_param: None,
            page_size: None,
        }
    }

    /// Page+session pagination with the conventional field names
    pub fn page_session(page_size: u64) -> Self {
        Self::PageSession {
            page_size,
            page_field: default_page_field(),
            total_field: default_total_field(),
            session_field: default_session_field(),
            page_size_param: None,
        }
    }

    /// Build the runtime strategy
    pub fn build(&self) -> Arc<dyn Paginator> {
        match self {
            Self::None => Arc::new(NoPaginator),
            Self::LinkCursor {
                next_path,
                page_size_param,
                page_size,
            } => {
                let mut paginator = LinkCursorPaginator::new(next_path.clone());
                if let (Some(param), Some(size)) = (page_size_param, page_size) {
                    paginator = paginator.with_page_size(param.clone(), *size);
                }
                Arc::new(paginator)
            }
            Self::PageSession {
                page_size,
                page_field,
                total_field,
                session_field,
                page_size_param,
            } => {
                let mut paginator = PageSessionPaginator::new(*page_size).with_fields(
                    page_field.clone(),
                    total_field.clone(),
                    session_field.clone(),
                );
                if let Some(param) = page_size_param {
                    paginator = paginator.with_page_size_param(param.clone());
                }
                Arc::new(paginator)
            }
        }
    }
}
