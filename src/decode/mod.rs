//! Response decoder module
//!
//! # Overview
//!
//! The HTTP client hands over an already-parsed JSON body; decoders pull the
//! records out of the provider's envelope using a configured path. Dotted
//! paths (`data`, `results.items`) are resolved directly, JSONPath
//! expressions with wildcards or indices (`$.data[*]`) go through
//! jsonpath-rust.

mod decoders;

pub use decoders::{JsonDecoder, RecordDecoder};
