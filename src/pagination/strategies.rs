//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{PaginationState, PaginationToken, Paginator};
use crate::types::{lookup_path, Record};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

// ============================================================================
// No Pagination
// ============================================================================

/// Single request, no further pages
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn initial_params(&self) -> PaginationToken {
        PaginationToken::new()
    }

    fn next_token(
        &self,
        _body: &Value,
        _records: &[Record],
        state: &mut PaginationState,
    ) -> Option<PaginationToken> {
        state.mark_done();
        None
    }
}

// ============================================================================
// Link Cursor Pagination
// ============================================================================

/// Next-link pagination (e.g., Klaviyo `links.next`)
///
/// The provider returns a full URL for the next page. Its query string is
/// parsed into a flat parameter map and handed back verbatim, so parameters
/// the provider embedded (cursor, filter, sort) carry forward untouched.
#[derive(Debug, Clone)]
pub struct LinkCursorPaginator {
    /// Dotted path to the next link in the response body
    pub next_path: String,
    /// Page size parameter and value sent when no token is present
    pub page_size: Option<(String, u32)>,
}

impl LinkCursorPaginator {
    /// Create a new link-cursor paginator
    pub fn new(next_path: impl Into<String>) -> Self {
        Self {
            next_path: next_path.into(),
            page_size: None,
        }
    }

    /// Send a page size on the first request
    #[must_use]
    pub fn with_page_size(mut self, param: impl Into<String>, size: u32) -> Self {
        self.page_size = Some((param.into(), size));
        self
    }
}

impl Default for LinkCursorPaginator {
    fn default() -> Self {
        Self::new("links.next")
    }
}

impl Paginator for LinkCursorPaginator {
    fn initial_params(&self) -> PaginationToken {
        let mut params = PaginationToken::new();
        if let Some((param, size)) = &self.page_size {
            params.insert(param.clone(), size.to_string());
        }
        params
    }

    fn next_token(
        &self,
        body: &Value,
        _records: &[Record],
        state: &mut PaginationState,
    ) -> Option<PaginationToken> {
        let link = lookup_path(body, &self.next_path)
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty());

        let Some(link) = link else {
            state.mark_done();
            return None;
        };

        let token = parse_link_params(link);
        if token.is_empty() {
            debug!(link, "Next link carries no parameters");
            state.mark_done();
            return None;
        }

        let next = state.issue(token);
        if next.is_none() {
            warn!(link, "Next link repeats an earlier page, stopping");
        }
        next
    }
}

/// Flatten a link's query string into a parameter map
///
/// Relative links are resolved against a placeholder origin; only the query
/// string matters.
fn parse_link_params(link: &str) -> PaginationToken {
    let parsed = Url::parse(link).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(link))
    });

    match parsed {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(e) => {
            warn!(link, error = %e, "Unparseable next link");
            PaginationToken::new()
        }
    }
}

// ============================================================================
// Page + Session Pagination
// ============================================================================

/// Page index plus server-side session (e.g., Mixpanel Engage)
///
/// The first page reports `total` and a `session_id`; later pages only echo
/// the page index. Pagination continues while `total > page_size * (page + 1)`.
#[derive(Debug, Clone)]
pub struct PageSessionPaginator {
    /// Records per page the provider returns
    pub page_size: u64,
    /// Response field (and request parameter) carrying the page index
    pub page_field: String,
    /// Response field carrying the total
    pub total_field: String,
    /// Response field (and request parameter) carrying the session id
    pub session_field: String,
    /// Request parameter for the page size, if the provider accepts one
    pub page_size_param: Option<String>,
}

impl PageSessionPaginator {
    /// Create a new paginator with `page`/`total`/`session_id` field names
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size,
            page_field: "page".to_string(),
            total_field: "total".to_string(),
            session_field: "session_id".to_string(),
            page_size_param: None,
        }
    }

    /// Override the response field names
    #[must_use]
    pub fn with_fields(
        mut self,
        page_field: impl Into<String>,
        total_field: impl Into<String>,
        session_field: impl Into<String>,
    ) -> Self {
        self.page_field = page_field.into();
        self.total_field = total_field.into();
        self.session_field = session_field.into();
        self
    }

    /// Send the page size as a request parameter
    #[must_use]
    pub fn with_page_size_param(mut self, param: impl Into<String>) -> Self {
        self.page_size_param = Some(param.into());
        self
    }

    fn finish(state: &mut PaginationState) -> Option<PaginationToken> {
        state.total = None;
        state.mark_done();
        None
    }
}

impl Paginator for PageSessionPaginator {
    fn initial_params(&self) -> PaginationToken {
        let mut params = PaginationToken::new();
        if let Some(param) = &self.page_size_param {
            params.insert(param.clone(), self.page_size.to_string());
        }
        params
    }

    fn next_token(
        &self,
        body: &Value,
        _records: &[Record],
        state: &mut PaginationState,
    ) -> Option<PaginationToken> {
        if self.page_size == 0 {
            warn!("Page size is zero, stopping");
            return Self::finish(state);
        }

        let Some(page) = lookup_path(body, &self.page_field).and_then(as_u64) else {
            return Self::finish(state);
        };

        if state.last_page.is_some_and(|last| page <= last) {
            warn!(page, last_page = ?state.last_page, "Page index did not advance, stopping");
            return Self::finish(state);
        }
        state.last_page = Some(page);

        if let Some(total) = lookup_path(body, &self.total_field)
            .and_then(as_u64)
            .filter(|total| *total > 0)
        {
            state.total = Some(total);
        }

        if let Some(session) = lookup_path(body, &self.session_field).and_then(as_text) {
            state.session_id = Some(session);
        }

        match state.total {
            Some(total) if total > self.page_size.saturating_mul(page + 1) => {
                let mut token = PaginationToken::new();
                token.insert(self.page_field.clone(), (page + 1).to_string());
                if let Some(session) = &state.session_id {
                    token.insert(self.session_field.clone(), session.clone());
                }
                if let Some(param) = &self.page_size_param {
                    token.insert(param.clone(), self.page_size.to_string());
                }
                state.issue(token)
            }
            _ => Self::finish(state),
        }
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
