//! State management module
//!
//! Handles cursor tracking, checkpointing, and resumability.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` / `CursorState` - per-stream markers, with an `archived` namespace
//! - `CursorManager` - monotonic cursor advance and filter low-water marks
//! - `StateManager` - file-based state persistence

mod cursor;
mod manager;
mod types;

pub use cursor::{
    CursorManager, CursorValue, DEFAULT_ARCHIVED_FLAG, DEFAULT_FILTER_TEMPLATE,
    SAFETY_MARGIN_SECS,
};
pub use manager::StateManager;
pub use types::{CursorState, Namespace, State};
