//! YAML parser for connector definitions
//!
//! Parses and validates connector YAML files.

use crate::error::{Error, Result};
use crate::loader::types::{ConnectorDefinition, StreamDefinition};
use crate::pagination::PaginationConfig;
use crate::partition::PartitionConfig;
use crate::template;
use crate::types::Method;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Load a connector definition from a file path
pub fn load_connector(path: impl AsRef<Path>) -> Result<ConnectorDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read connector file '{}': {e}",
            path.display()
        ))
    })?;
    load_connector_from_str(&content)
}

/// Load a connector definition from a YAML string
pub fn load_connector_from_str(yaml: &str) -> Result<ConnectorDefinition> {
    let def: ConnectorDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse connector YAML: {e}")))?;

    validate_connector(&def)?;
    Ok(def)
}

/// Validate a connector definition
fn validate_connector(def: &ConnectorDefinition) -> Result<()> {
    if def.name.is_empty() {
        return Err(Error::config("Connector name cannot be empty"));
    }

    if def.base_url.is_empty() {
        return Err(Error::config("Connector base_url cannot be empty"));
    }

    if def.streams.is_empty() {
        return Err(Error::config("Connector must have at least one stream"));
    }

    let stream_names: HashSet<_> = def.streams.iter().map(|s| s.name.as_str()).collect();
    if stream_names.len() != def.streams.len() {
        return Err(Error::config("Duplicate stream names found"));
    }

    for stream in &def.streams {
        validate_stream(stream, &stream_names)?;
    }

    validate_parent_chains(def)
}

/// Validate a stream definition
fn validate_stream(stream: &StreamDefinition, known: &HashSet<&str>) -> Result<()> {
    if stream.name.is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    if stream.request.path.is_empty() {
        return Err(Error::config(format!(
            "Stream '{}' path cannot be empty",
            stream.name
        )));
    }

    stream.request.method.parse::<Method>().map_err(|_| {
        Error::config(format!(
            "Stream '{}' has invalid HTTP method: {}",
            stream.name, stream.request.method
        ))
    })?;

    if let Some(parent) = stream.partition.parent_stream() {
        if !known.contains(parent) {
            return Err(Error::config(format!(
                "Stream '{}' references unknown parent stream '{parent}'",
                stream.name
            )));
        }
    }

    if stream.partition == PartitionConfig::None && uses_partition(stream) {
        return Err(Error::config(format!(
            "Stream '{}' references partition values but has no partition router",
            stream.name
        )));
    }

    if let PaginationConfig::PageSession { page_size: 0, .. } = stream.pagination {
        return Err(Error::InvalidConfigValue {
            field: format!("{}.pagination.page_size", stream.name),
            message: "must be greater than zero".to_string(),
        });
    }

    if stream.checkpoint_interval == Some(0) {
        return Err(Error::InvalidConfigValue {
            field: format!("{}.checkpoint_interval", stream.name),
            message: "must be greater than zero".to_string(),
        });
    }

    Ok(())
}

/// Whether any request template reads `partition.*`
fn uses_partition(stream: &StreamDefinition) -> bool {
    let request = &stream.request;
    let body = request.body.as_ref().map(ToString::to_string);

    std::iter::once(&request.path)
        .chain(request.params.values())
        .chain(request.filters.iter())
        .chain(request.headers.values())
        .chain(body.as_ref())
        .flat_map(|t| template::extract_variables(t))
        .any(|var| var == "partition" || var.starts_with("partition."))
}

/// Reject parent chains that loop back on themselves
fn validate_parent_chains(def: &ConnectorDefinition) -> Result<()> {
    let parents: HashMap<&str, &str> = def
        .streams
        .iter()
        .filter_map(|s| Some((s.name.as_str(), s.partition.parent_stream()?)))
        .collect();

    for start in parents.keys() {
        let mut seen = HashSet::new();
        let mut current = *start;
        while let Some(parent) = parents.get(current) {
            if !seen.insert(current) {
                return Err(Error::config(format!(
                    "Parent stream cycle detected at '{current}'"
                )));
            }
            current = parent;
        }
    }

    Ok(())
}
