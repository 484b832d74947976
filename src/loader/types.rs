//! Loader types
//!
//! Declarative connector definition types for YAML parsing.

use crate::auth::Location;
use crate::engine::{DEFAULT_ARCHIVED_FILTER, DEFAULT_FILTER_PARAM};
use crate::http::QuotaPeriod;
use crate::pagination::PaginationConfig;
use crate::partition::PartitionConfig;
use crate::state::{DEFAULT_ARCHIVED_FLAG, DEFAULT_FILTER_TEMPLATE};
use crate::types::CursorFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Connector Definition
// ============================================================================

/// Top-level connector definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectorDefinition {
    /// Connector name
    pub name: String,
    /// Connector version
    #[serde(default = "default_version")]
    pub version: String,
    /// Base URL for all requests (templated)
    pub base_url: String,
    /// Authentication configuration
    #[serde(default)]
    pub auth: Option<AuthDefinition>,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Global headers (templated)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Stream definitions
    pub streams: Vec<StreamDefinition>,
}

impl ConnectorDefinition {
    /// Look up a stream definition by name
    pub fn stream(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Stream names in definition order
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

// ============================================================================
// Auth Definition
// ============================================================================

/// Authentication definition; string values are templates over `config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthDefinition {
    /// API key authentication
    ApiKey {
        /// Header or query param name
        key: String,
        /// Value (usually a template like `{{ config.api_key }}`)
        value: String,
        /// Location: header or query
        #[serde(default)]
        location: Location,
        /// Prefix prepended to the value (e.g. `Klaviyo-API-Key `)
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Bearer token authentication
    Bearer {
        /// Token value (template)
        token: String,
    },
    /// Basic authentication
    Basic {
        /// Username (template)
        username: String,
        /// Password (template)
        #[serde(default)]
        password: String,
    },
    /// Secret sent base64-encoded as `Basic <b64>`
    Base64Token {
        /// Secret (template)
        token: String,
    },
    /// Arbitrary headers
    CustomHeaders {
        /// Header templates
        headers: BTreeMap<String, String>,
    },
    /// No authentication
    None,
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retry policy
    #[serde(default)]
    pub retry: RetryDefinition,
    /// Client-side quota
    #[serde(default)]
    pub rate_limit: Option<RateLimitDefinition>,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retry: RetryDefinition::default(),
            rate_limit: None,
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryDefinition {
    /// Attempts per request, including the first
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    /// Backoff factor in seconds; the wait is `factor * 2^attempt`
    #[serde(default = "default_factor_secs")]
    pub factor_secs: f64,
    /// Ceiling on cumulative waiting, in seconds
    #[serde(default = "default_max_time_secs")]
    pub max_time_secs: u64,
    /// Field holding the provider's error code in each error entry
    #[serde(default)]
    pub error_code_field: Option<String>,
    /// Error codes meaning "limit exceeded"
    #[serde(default)]
    pub limit_codes: Vec<String>,
    /// Statuses the limit codes apply to (empty = every 4xx)
    #[serde(default)]
    pub limit_statuses: Vec<u16>,
}

impl Default for RetryDefinition {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            factor_secs: default_factor_secs(),
            max_time_secs: default_max_time_secs(),
            error_code_field: None,
            limit_codes: Vec::new(),
            limit_statuses: Vec::new(),
        }
    }
}

fn default_max_tries() -> u32 {
    5
}

fn default_factor_secs() -> f64 {
    5.0
}

fn default_max_time_secs() -> u64 {
    600
}

/// Client-side quota configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitDefinition {
    /// Requests per period
    pub requests: u32,
    /// Period the quota is counted over
    #[serde(default)]
    pub period: QuotaPeriod,
    /// Burst size
    #[serde(default)]
    pub burst: Option<u32>,
}

// ============================================================================
// Stream Definition
// ============================================================================

/// Stream definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Request configuration
    pub request: RequestDefinition,
    /// Path to the records in the response (dotted or JSONPath)
    #[serde(default)]
    pub records_path: Option<String>,
    /// Primary key fields
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Pagination configuration
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Incremental configuration
    #[serde(default)]
    pub incremental: Option<IncrementalDefinition>,
    /// Partition router
    #[serde(default)]
    pub partition: PartitionConfig,
    /// Secondary pass over archived records
    #[serde(default)]
    pub archived: Option<ArchivedDefinition>,
    /// Emit a state message every N records
    #[serde(default)]
    pub checkpoint_interval: Option<usize>,
}

// ============================================================================
// Request Definition
// ============================================================================

/// Request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestDefinition {
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,
    /// URL path (can contain templates)
    pub path: String,
    /// Query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Static filter clauses
    #[serde(default)]
    pub filters: Vec<String>,
    /// Query parameter carrying the joined filter clauses
    #[serde(default = "default_filter_param")]
    pub filter_param: String,
    /// Stream-specific headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON request body (for POST/PUT)
    #[serde(default)]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_filter_param() -> String {
    DEFAULT_FILTER_PARAM.to_string()
}

// ============================================================================
// Incremental Definition
// ============================================================================

/// Cursor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IncrementalDefinition {
    /// Top-level cursor field
    pub cursor_field: String,
    /// Nested path lifted to the cursor field (e.g. `attributes.updated`)
    #[serde(default)]
    pub cursor_path: Option<String>,
    /// Cursor value format
    #[serde(default)]
    pub format: CursorFormat,
    /// Filter template with `{field}` and `{value}` placeholders
    #[serde(default = "default_filter_template")]
    pub filter_template: String,
    /// Sort query parameter
    #[serde(default)]
    pub sort_param: Option<String>,
    /// Sort value; defaults to the cursor field
    #[serde(default)]
    pub sort_value: Option<String>,
    /// Lower bound when no state exists (template)
    #[serde(default)]
    pub start_date: Option<String>,
}

fn default_filter_template() -> String {
    DEFAULT_FILTER_TEMPLATE.to_string()
}

/// Archived pass configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArchivedDefinition {
    /// Boolean flag marking a record as archived
    #[serde(default = "default_flag_path")]
    pub flag_path: String,
    /// Filter clause selecting archived records
    #[serde(default = "default_archived_filter")]
    pub filter: String,
}

impl Default for ArchivedDefinition {
    fn default() -> Self {
        Self {
            flag_path: default_flag_path(),
            filter: default_archived_filter(),
        }
    }
}

fn default_flag_path() -> String {
    DEFAULT_ARCHIVED_FLAG.to_string()
}

fn default_archived_filter() -> String {
    DEFAULT_ARCHIVED_FILTER.to_string()
}
