//! Template interpolation for connector definitions
//!
//! Handles `{{ variable }}` interpolation in paths, query parameters,
//! request filters and bodies. Supports nested access like
//! `{{ config.project_id }}`, `{{ partition.cohort_id }}` and
//! `{{ partition.parent_slice.id }}`.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Connector configuration values
    pub config: Value,
    /// Current partition values
    pub partition: Value,
    /// Stream cursor state for the active namespace
    pub stream_state: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set config values
    pub fn set_config(&mut self, config: Value) -> &mut Self {
        self.config = config;
        self
    }

    /// Set partition values
    pub fn set_partition(&mut self, partition: Value) -> &mut Self {
        self.partition = partition;
        self
    }

    /// Set stream state values
    pub fn set_stream_state(&mut self, state: Value) -> &mut Self {
        self.stream_state = state;
        self
    }

    /// Get a value by path (e.g., "config.api_key")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();

        let root = match parts[0] {
            "config" => &self.config,
            "partition" => &self.partition,
            "stream_state" => &self.stream_state,
            // Bare names resolve against config
            _ => return get_nested_value(&self.config, &parts),
        };

        get_nested_value(root, &parts[1..])
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &Captures<'_>| {
        let var_path = &cap[1];
        if let Some(value) = ctx.get(var_path) {
            value_to_string(value)
        } else {
            missing.push(var_path.to_string());
            String::new()
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For complex types, use JSON serialization
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Render all string values in a JSON object/value
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) => {
            if has_templates(s) {
                Ok(Value::String(render(s, ctx)?))
            } else {
                Ok(value.clone())
            }
        }
        Value::Object(map) => {
            let mut new_map = serde_json::Map::new();
            for (k, v) in map {
                new_map.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(Value::Object(new_map))
        }
        Value::Array(arr) => {
            let new_arr: Result<Vec<Value>> = arr.iter().map(|v| render_value(v, ctx)).collect();
            Ok(Value::Array(new_arr?))
        }
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_substitution() {
        let ctx = TemplateContext::with_config(json!({
            "project_id": "2291"
        }));

        let result = render("project={{ config.project_id }}", &ctx).unwrap();
        assert_eq!(result, "project=2291");
    }

    #[test]
    fn test_partition_context() {
        let mut ctx = TemplateContext::new();
        ctx.set_partition(json!({"cohort_id": 1478097, "parent_slice": {"region": "EU"}}));

        let result = render(
            "/cohorts/{{ partition.cohort_id }}/{{ partition.parent_slice.region }}",
            &ctx,
        )
        .unwrap();
        assert_eq!(result, "/cohorts/1478097/EU");
    }

    #[test]
    fn test_repeated_variable() {
        let mut ctx = TemplateContext::new();
        ctx.set_partition(json!({"id": "a1"}));

        let result = render("{{ partition.id }}-{{partition.id}}", &ctx).unwrap();
        assert_eq!(result, "a1-a1");
    }

    #[test]
    fn test_bare_name_resolves_config() {
        let ctx = TemplateContext::with_config(json!({"region": "EU"}));
        assert_eq!(render("{{ region }}", &ctx).unwrap(), "EU");
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = TemplateContext::new();
        let result = render("{{ config.missing }} {{ partition.id }}", &ctx);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("config.missing"));
        assert!(message.contains("partition.id"));
    }

    #[test]
    fn test_has_templates() {
        assert!(has_templates("{{ config.key }}"));
        assert!(has_templates("prefix {{ var }} suffix"));
        assert!(!has_templates("no templates here"));
        assert!(!has_templates("{ not a template }"));
    }

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables("{{ config.a }} and {{ partition.b }}");
        assert_eq!(vars, vec!["config.a", "partition.b"]);
    }

    #[test]
    fn test_render_value_object() {
        let mut ctx = TemplateContext::new();
        ctx.set_partition(json!({"id": 1478097}));

        let input = json!({
            "filter_by_cohort": "{\"id\":{{ partition.id }}}",
            "limit": 100
        });

        let result = render_value(&input, &ctx).unwrap();
        assert_eq!(
            result,
            json!({
                "filter_by_cohort": "{\"id\":1478097}",
                "limit": 100
            })
        );
    }

    #[test]
    fn test_number_and_bool_substitution() {
        let ctx = TemplateContext::with_config(json!({
            "limit": 100,
            "enabled": true
        }));

        let result = render(
            "limit={{ config.limit }}&enabled={{ config.enabled }}",
            &ctx,
        )
        .unwrap();
        assert_eq!(result, "limit=100&enabled=true");
    }
}
