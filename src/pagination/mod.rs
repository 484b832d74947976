//! Pagination module
//!
//! Supports: Link cursor (next link in the envelope), Page + session, None
//!
//! # Overview
//!
//! Each strategy looks at the last response of a partition and decides
//! whether another page exists. A returned [`PaginationToken`] replaces the
//! computed request parameters for the next request; `None` ends the
//! partition. Every strategy terminates on repetition, so a drifting API
//! cannot loop a partition forever.

mod strategies;
mod types;

pub use strategies::{LinkCursorPaginator, NoPaginator, PageSessionPaginator};
pub use types::{PaginationConfig, PaginationState, PaginationToken, Paginator};
