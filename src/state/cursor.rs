//! Cursor tracking for incremental streams
//!
//! [`CursorManager`] owns the rules for one stream's cursor: how values are
//! parsed, which namespace a record advances, and how the request filter's
//! low-water mark is derived. Stored markers only ever move forward.

use super::types::{CursorState, Namespace};
use crate::error::{Error, Result};
use crate::types::{lookup_record, CursorFormat, Record};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Margin subtracted from "now" when building filters; providers index
/// recent writes with a short delay
pub const SAFETY_MARGIN_SECS: i64 = 3;

/// Default filter template
pub const DEFAULT_FILTER_TEMPLATE: &str = "greater-than({field},{value})";

/// Default path of the archived flag
pub const DEFAULT_ARCHIVED_FLAG: &str = "attributes.archived";

// ============================================================================
// Cursor Values
// ============================================================================

/// A comparable cursor value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CursorValue {
    /// Point in time
    Timestamp(DateTime<Utc>),
    /// Monotonic integer
    Ordinal(i64),
}

impl CursorValue {
    /// Parse a record value according to the stream's cursor format
    pub fn parse(value: &Value, format: CursorFormat) -> Option<Self> {
        match format {
            CursorFormat::Iso8601 => value.as_str().and_then(parse_datetime).map(Self::Timestamp),
            CursorFormat::Unix => as_i64(value)
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .map(Self::Timestamp),
            CursorFormat::UnixMs => as_i64(value)
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(Self::Timestamp),
            CursorFormat::Ordinal => as_i64(value).map(Self::Ordinal),
        }
    }

    /// Parse a persisted marker; timestamps may be stored as RFC 3339
    /// regardless of the record format
    pub fn parse_stored(value: &Value, format: CursorFormat) -> Option<Self> {
        Self::parse(value, format).or_else(|| match (format, value) {
            (CursorFormat::Unix | CursorFormat::UnixMs, Value::String(s)) => {
                parse_datetime(s).map(Self::Timestamp)
            }
            _ => None,
        })
    }

    /// Value as persisted in state
    pub fn to_state_value(&self) -> Value {
        match self {
            Self::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Ordinal(n) => Value::from(*n),
        }
    }

    /// Value as rendered into a request filter
    pub fn to_param(&self, format: CursorFormat) -> String {
        match (self, format) {
            (Self::Timestamp(ts), CursorFormat::Unix) => ts.timestamp().to_string(),
            (Self::Timestamp(ts), CursorFormat::UnixMs) => ts.timestamp_millis().to_string(),
            (Self::Timestamp(ts), _) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            (Self::Ordinal(n), _) => n.to_string(),
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339, then naive date-times (assumed UTC), then bare dates
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Cursor Manager
// ============================================================================

/// Cursor rules for one incremental stream
#[derive(Debug, Clone)]
pub struct CursorManager {
    stream: String,
    field: String,
    format: CursorFormat,
    start: Option<CursorValue>,
    filter_template: String,
    archived_flag: Option<String>,
}

impl CursorManager {
    /// Create a manager for `stream` tracking the top-level `field`
    pub fn new(stream: impl Into<String>, field: impl Into<String>, format: CursorFormat) -> Self {
        Self {
            stream: stream.into(),
            field: field.into(),
            format,
            start: None,
            filter_template: DEFAULT_FILTER_TEMPLATE.to_string(),
            archived_flag: None,
        }
    }

    /// Lower bound used when no marker is stored
    #[must_use]
    pub fn with_start(mut self, start: CursorValue) -> Self {
        self.start = Some(start);
        self
    }

    /// Parse and set the lower bound (e.g. a configured `start_date`)
    pub fn with_start_str(self, start: &str) -> Result<Self> {
        let value = CursorValue::parse_stored(&Value::String(start.to_string()), self.format)
            .ok_or_else(|| Error::InvalidConfigValue {
                field: "start_date".to_string(),
                message: format!("cannot parse '{start}' as {:?}", self.format),
            })?;
        Ok(self.with_start(value))
    }

    /// Template for the request filter; `{field}` and `{value}` are substituted
    #[must_use]
    pub fn with_filter_template(mut self, template: impl Into<String>) -> Self {
        self.filter_template = template.into();
        self
    }

    /// Route records whose boolean flag at `path` is true to the archived namespace
    #[must_use]
    pub fn with_archived_flag(mut self, path: impl Into<String>) -> Self {
        self.archived_flag = Some(path.into());
        self
    }

    /// Stream name
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Top-level cursor field
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Cursor value format
    pub fn format(&self) -> CursorFormat {
        self.format
    }

    /// Namespace a record advances
    pub fn namespace_of(&self, record: &Record) -> Namespace {
        let Some(path) = &self.archived_flag else {
            return Namespace::Primary;
        };

        let flagged = lookup_record(record, path)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if flagged {
            Namespace::Archived
        } else {
            Namespace::Primary
        }
    }

    /// Persisted marker for a namespace
    pub fn stored(&self, state: &CursorState, namespace: Namespace) -> Result<Option<CursorValue>> {
        match state.get(namespace, &self.field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => CursorValue::parse_stored(value, self.format)
                .map(Some)
                .ok_or_else(|| self.parse_error(value)),
        }
    }

    /// Fold a record's cursor value into the state, keeping the maximum.
    ///
    /// Records without the field leave the state untouched; a present but
    /// unparseable value fails the stream.
    pub fn advance(&self, state: &mut CursorState, record: &Record) -> Result<()> {
        let raw = match record.get(&self.field) {
            None | Some(Value::Null) => return Ok(()),
            Some(raw) => raw,
        };

        let value = CursorValue::parse(raw, self.format).ok_or_else(|| self.parse_error(raw))?;
        let namespace = self.namespace_of(record);

        let current = self.stored(state, namespace)?.or(self.start);
        let next = match current {
            Some(current) if current >= value => current,
            _ => value,
        };

        state.set(namespace, &self.field, next.to_state_value());
        Ok(())
    }

    /// `max(stored, start)` for a namespace, before clamping
    pub fn low_water_mark(
        &self,
        state: &CursorState,
        namespace: Namespace,
    ) -> Result<Option<CursorValue>> {
        let stored = self.stored(state, namespace)?;
        Ok(match (stored, self.start) {
            (Some(stored), Some(start)) => Some(stored.max(start)),
            (stored, start) => stored.or(start),
        })
    }

    /// Low-water mark clamped to `now - 3s`; a marker in the future would
    /// otherwise filter out every record
    pub fn effective_low_water_mark(
        &self,
        state: &CursorState,
        namespace: Namespace,
        now: DateTime<Utc>,
    ) -> Result<Option<CursorValue>> {
        let ceiling = now - Duration::seconds(SAFETY_MARGIN_SECS);
        Ok(self
            .low_water_mark(state, namespace)?
            .map(|value| match value {
                CursorValue::Timestamp(ts) => CursorValue::Timestamp(ts.min(ceiling)),
                ordinal => ordinal,
            }))
    }

    /// Rendered filter clause for a namespace, if a low-water mark exists
    pub fn filter_clause(
        &self,
        state: &CursorState,
        namespace: Namespace,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        Ok(self
            .effective_low_water_mark(state, namespace, now)?
            .map(|value| self.render_filter(&value)))
    }

    /// Substitute `{field}` and `{value}` into the filter template
    pub fn render_filter(&self, value: &CursorValue) -> String {
        self.filter_template
            .replace("{field}", &self.field)
            .replace("{value}", &value.to_param(self.format))
    }

    fn parse_error(&self, value: &Value) -> Error {
        Error::cursor_parse(&self.stream, &self.field, value.to_string())
    }
}
