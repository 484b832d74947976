//! YAML Loader module
//!
//! Parse connector definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ConnectorDefinition` - Declarative connector definition
//! - `StreamDefinition` - Stream configuration
//! - YAML parsing with validation
//! - Construction of the HTTP client and engine streams

mod build;
mod parser;
mod types;

pub use parser::{load_connector, load_connector_from_str};
pub use types::{
    ArchivedDefinition, AuthDefinition, ConnectorDefinition, HttpDefinition,
    IncrementalDefinition, RateLimitDefinition, RequestDefinition, RetryDefinition,
    StreamDefinition,
};
