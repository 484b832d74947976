//! Provider error-body classification
//!
//! Some providers report hard request limits with a 4xx status and a
//! machine-readable code in the body instead of a 429. Each provider gets a
//! single classifier that the retry policy consults for non-429 client
//! errors. Classifiers never see the transport, only the decoded body.

use crate::types::lookup_path;
use serde_json::Value;

/// Inspects structured error bodies for provider-specific signals
pub trait ErrorClassifier: Send + Sync + std::fmt::Debug {
    /// Whether a 4xx response body signals a limit the caller should back off from
    fn is_limit_exceeded(&self, status: u16, body: &Value) -> bool;

    /// Human-readable provider message, if the body carries one
    fn message(&self, body: &Value) -> Option<String> {
        error_message(body)
    }
}

/// Classifier for providers without limit codes: every non-429 4xx gives up
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl ErrorClassifier for DefaultClassifier {
    fn is_limit_exceeded(&self, _status: u16, _body: &Value) -> bool {
        false
    }
}

/// Scans an error list for a configured set of limit codes
///
/// Handles the two envelope shapes seen in practice: a bare array of error
/// objects (`[{"errorCode": "REQUEST_LIMIT_EXCEEDED", ...}]`) and an object
/// with an `errors` array (`{"errors": [{"code": "throttled"}]}`). A single
/// error object is treated as a one-element list.
#[derive(Debug, Clone)]
pub struct ErrorCodeClassifier {
    /// Dotted path of the code inside each error entry
    code_field: String,
    /// Codes that mean "limit exceeded"
    limit_codes: Vec<String>,
    /// Statuses the codes are honoured on (empty = every 4xx)
    statuses: Vec<u16>,
}

impl ErrorCodeClassifier {
    /// Create a classifier looking up `code_field` in each error entry
    pub fn new(code_field: impl Into<String>, limit_codes: Vec<String>) -> Self {
        Self {
            code_field: code_field.into(),
            limit_codes,
            statuses: Vec::new(),
        }
    }

    /// Salesforce-style classifier: `[{"errorCode": "REQUEST_LIMIT_EXCEEDED"}]`
    pub fn request_limit_exceeded() -> Self {
        Self::new("errorCode", vec!["REQUEST_LIMIT_EXCEEDED".to_string()])
    }

    /// Only honour limit codes on these statuses
    #[must_use]
    pub fn on_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.statuses = statuses;
        self
    }

    fn entry_code<'a>(&self, entry: &'a Value) -> Option<&'a str> {
        lookup_path(entry, &self.code_field).and_then(Value::as_str)
    }
}

impl ErrorClassifier for ErrorCodeClassifier {
    fn is_limit_exceeded(&self, status: u16, body: &Value) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&status) {
            return false;
        }

        error_entries(body).into_iter().any(|entry| {
            self.entry_code(entry)
                .is_some_and(|code| self.limit_codes.iter().any(|c| c == code))
        })
    }
}

/// Flatten the supported envelope shapes into a list of error entries
fn error_entries(body: &Value) -> Vec<&Value> {
    match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("errors") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![body],
        },
        _ => Vec::new(),
    }
}

/// Pull the first message-like field out of an error body
pub fn error_message(body: &Value) -> Option<String> {
    if let Value::String(text) = body {
        return (!text.is_empty()).then(|| text.clone());
    }

    error_entries(body).into_iter().find_map(|entry| {
        ["message", "detail", "error", "title"]
            .iter()
            .find_map(|key| entry.get(*key).and_then(Value::as_str))
            .map(ToString::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!([{"errorCode": "REQUEST_LIMIT_EXCEEDED", "message": "TotalRequests Limit exceeded."}]), true ; "bare array with limit code")]
    #[test_case(json!([{"errorCode": "INVALID_TYPE_FOR_OPERATION"}]), false ; "bare array with other code")]
    #[test_case(json!({"errors": [{"errorCode": "REQUEST_LIMIT_EXCEEDED"}]}), true ; "errors envelope")]
    #[test_case(json!({"errorCode": "REQUEST_LIMIT_EXCEEDED"}), true ; "single error object")]
    #[test_case(json!("Forbidden"), false ; "plain text body")]
    #[test_case(json!([]), false ; "empty list")]
    fn test_request_limit_classifier(body: Value, expected: bool) {
        let classifier = ErrorCodeClassifier::request_limit_exceeded();
        assert_eq!(classifier.is_limit_exceeded(403, &body), expected);
    }

    #[test]
    fn test_nested_code_field() {
        let classifier =
            ErrorCodeClassifier::new("meta.code", vec!["throttled".to_string()]);
        let body = json!({"errors": [{"meta": {"code": "throttled"}}]});
        assert!(classifier.is_limit_exceeded(400, &body));
    }

    #[test]
    fn test_status_restriction() {
        let classifier = ErrorCodeClassifier::request_limit_exceeded().on_statuses(vec![403]);
        let body = json!([{"errorCode": "REQUEST_LIMIT_EXCEEDED"}]);
        assert!(classifier.is_limit_exceeded(403, &body));
        assert!(!classifier.is_limit_exceeded(400, &body));
    }

    #[test]
    fn test_default_classifier_never_limits() {
        let body = json!([{"errorCode": "REQUEST_LIMIT_EXCEEDED"}]);
        assert!(!DefaultClassifier.is_limit_exceeded(403, &body));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(&json!([{"errorCode": "X", "message": "No access"}])),
            Some("No access".to_string())
        );
        assert_eq!(
            error_message(&json!({"errors": [{"detail": "Invalid filter"}]})),
            Some("Invalid filter".to_string())
        );
        assert_eq!(
            error_message(&json!("plain")),
            Some("plain".to_string())
        );
        assert_eq!(error_message(&json!({"ok": false})), None);
    }
}
