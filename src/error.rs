//! Error types for Tidemark
//!
//! This module defines the error hierarchy for the entire engine.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Transport failures are split the way the retry policy sees them:
//! transient failures and rate limits are retried, client errors end the
//! current partition, fatal errors end the whole stream read, and anything
//! the policy cannot classify is carried through unchanged as [`Error::Http`].

use thiserror::Error;

/// The main error type for Tidemark
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    /// Transport failure the retry policy could not classify
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Timeout, disconnect, truncated payload or 5xx that outlived its retries
    #[error("Transient transport failure: {message}")]
    Transient { message: String },

    /// Throttled (429 or a limit-coded 4xx) and out of retry budget
    #[error("Rate limited{}: {message}", retry_after_suffix(.retry_after_seconds))]
    RateLimited {
        retry_after_seconds: Option<u64>,
        message: String,
    },

    /// Non-retryable 4xx
    #[error("HTTP {status}: {message}")]
    Client { status: u16, message: String },

    /// Backoff cannot succeed; the stream read is aborted
    #[error("Fatal: {message}")]
    Fatal { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Stream '{stream}': cannot parse cursor field '{field}' value {value}")]
    CursorParse {
        stream: String,
        field: String,
        value: String,
    },

    // ============================================================================
    // Stream Errors
    // ============================================================================
    #[error("Stream '{stream}' not found")]
    StreamNotFound { stream: String },

    #[error("Partition error for stream '{stream}': {message}")]
    Partition { stream: String, message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a transient transport error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a non-retryable client error
    pub fn client(status: u16, message: impl Into<String>) -> Self {
        Self::Client {
            status,
            message: message.into(),
        }
    }

    /// Create a fatal error
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Create a JSONPath error
    pub fn json_path(message: impl Into<String>) -> Self {
        Self::JsonPath {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a cursor parse error
    pub fn cursor_parse(
        stream: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::CursorParse {
            stream: stream.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a partition error
    pub fn partition(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Partition {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient { .. } | Error::RateLimited { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if this error must abort the whole stream read
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal { .. } | Error::CursorParse { .. })
    }

    /// Check if this error only terminates the partition that raised it
    pub fn is_partition_scoped(&self) -> bool {
        matches!(
            self,
            Error::Client { .. } | Error::Transient { .. } | Error::RateLimited { .. }
        )
    }
}

fn retry_after_suffix(seconds: &Option<u64>) -> String {
    seconds
        .map(|s| format!(", retry after {s}s"))
        .unwrap_or_default()
}

/// Result type alias for Tidemark
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("api_key");
        assert_eq!(err.to_string(), "Missing required config field: api_key");

        let err = Error::client(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::RateLimited {
            retry_after_seconds: Some(30),
            message: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 30s: slow down");

        let err = Error::RateLimited {
            retry_after_seconds: None,
            message: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "Rate limited: slow down");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::transient("timeout").is_retryable());
        assert!(Error::RateLimited {
            retry_after_seconds: Some(60),
            message: String::new(),
        }
        .is_retryable());

        assert!(!Error::client(400, "").is_retryable());
        assert!(!Error::fatal("limit").is_retryable());
        assert!(!Error::config("test").is_retryable());
    }

    #[test]
    fn test_scope_classification() {
        assert!(Error::fatal("x").is_fatal());
        assert!(Error::cursor_parse("flows", "updated", "\"garbage\"").is_fatal());
        assert!(!Error::client(403, "").is_fatal());

        assert!(Error::client(403, "").is_partition_scoped());
        assert!(Error::transient("5xx").is_partition_scoped());
        assert!(!Error::fatal("x").is_partition_scoped());
        assert!(!Error::config("x").is_partition_scoped());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
