//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::engine::{Extractor, Message, SyncConfig};
use crate::error::{Error, Result};
use crate::loader::{load_connector, ConnectorDefinition};
use crate::state::StateManager;
use serde_json::{json, Value};
use std::fs;
use std::time::Instant;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Read {
                streams,
                config_json,
                max_records,
                checkpoint_interval,
                fail_fast,
            } => {
                let mut sync = SyncConfig::new().with_fail_fast(*fail_fast);
                if let Some(max) = max_records {
                    sync = sync.with_max_records(*max);
                }
                if let Some(every) = checkpoint_interval {
                    sync = sync.with_checkpoint_interval(*every);
                }
                self.read(streams.as_deref(), config_json.as_deref(), sync)
                    .await
            }
            Commands::Validate => self.validate(),
            Commands::Streams => self.streams(),
        }
    }

    /// Load connector definition
    fn load_connector(&self) -> Result<ConnectorDefinition> {
        let path = self
            .cli
            .connector
            .as_ref()
            .ok_or_else(|| Error::config("Connector file not specified (use -c flag)"))?;
        load_connector(path)
    }

    /// Load configuration
    fn load_config(&self, inline: Option<&str>) -> Result<Value> {
        // Inline config takes precedence
        if let Some(json_str) = inline {
            return serde_json::from_str(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        if let Some(path) = &self.cli.config {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
            return serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        Ok(json!({}))
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Read the selected streams in definition order
    async fn read(
        &self,
        streams: Option<&str>,
        config_json: Option<&str>,
        sync: SyncConfig,
    ) -> Result<()> {
        let sync_start = Instant::now();
        let connector = self.load_connector()?;
        let config = self.load_config(config_json)?;
        let state = self.load_state()?;
        let extractor = connector.extractor(config, sync)?;

        let selected = select_streams(&connector, streams)?;
        let mut stream_results = Vec::with_capacity(selected.len());
        let mut total_records = 0usize;

        for name in selected {
            let stream_start = Instant::now();
            self.output_message(&Message::info(format!("Starting sync for stream: {name}")));

            let (records, outcome) = self.read_stream(&extractor, &state, name).await;
            total_records += records;
            let duration_ms = stream_start.elapsed().as_millis() as u64;

            stream_results.push(match outcome {
                Ok(()) => json!({
                    "stream": name,
                    "status": "SUCCESS",
                    "records_synced": records,
                    "duration_ms": duration_ms
                }),
                Err(e) => {
                    warn!(stream = %name, error = %e, "Stream failed");
                    self.output_message(&Message::error(format!(
                        "Error syncing stream {name}: {e}"
                    )));
                    json!({
                        "stream": name,
                        "status": "FAILED",
                        "error": e.to_string(),
                        "records_synced": records,
                        "duration_ms": duration_ms
                    })
                }
            });
        }

        state.save().await?;
        self.output_json(&json!({
            "type": "STATE",
            "state": serde_json::to_value(state.snapshot().await)?
        }));

        let failed = stream_results
            .iter()
            .filter(|r| r["status"] == "FAILED")
            .count();
        let status = if failed == 0 {
            "SUCCEEDED"
        } else if failed == stream_results.len() {
            "FAILED"
        } else {
            "PARTIAL"
        };

        info!(connector = %connector.name, total_records, status, "Sync finished");
        self.output_json(&json!({
            "type": "SYNC_SUMMARY",
            "summary": {
                "status": status,
                "connector": connector.name,
                "total_records": total_records,
                "total_streams": stream_results.len(),
                "failed_streams": failed,
                "duration_ms": sync_start.elapsed().as_millis() as u64,
                "state_file": self.cli.state.as_ref().map(|p| p.to_string_lossy().to_string()),
                "streams": stream_results
            }
        }));

        Ok(())
    }

    /// Drain one stream, recording every checkpoint; returns the record count
    async fn read_stream(
        &self,
        extractor: &Extractor,
        state: &StateManager,
        name: &str,
    ) -> (usize, Result<()>) {
        let cursor = state.stream_state(name).await;
        let mut reader = match extractor.read(name, cursor) {
            Ok(reader) => reader,
            Err(e) => return (0, Err(e)),
        };

        let outcome = loop {
            match reader.next_message().await {
                Ok(Some(message)) => {
                    if let Message::State { stream, data } = &message {
                        if let Err(e) = state.set_stream_state(stream, data.clone()).await {
                            break Err(e);
                        }
                    }
                    self.output_message(&message);
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        (reader.stats().records_synced, outcome)
    }

    /// Validate connector definition
    fn validate(&self) -> Result<()> {
        let connector = self.load_connector()?;

        self.output_json(&json!({
            "type": "VALIDATION",
            "valid": true,
            "connector": connector.name,
            "version": connector.version,
            "streams": connector.streams.len()
        }));

        Ok(())
    }

    /// List stream names
    fn streams(&self) -> Result<()> {
        let connector = self.load_connector()?;

        self.output_json(&json!({
            "type": "STREAMS",
            "streams": connector.stream_names(),
            "connector": connector.name
        }));

        Ok(())
    }

    fn output_message(&self, message: &Message) {
        self.output_json(&message.to_json());
    }

    fn output_json(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Resolve a comma-separated stream filter against the connector
fn select_streams<'a>(
    connector: &'a ConnectorDefinition,
    filter: Option<&str>,
) -> Result<Vec<&'a str>> {
    let Some(filter) = filter.filter(|f| !f.trim().is_empty()) else {
        return Ok(connector.stream_names());
    };

    filter
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            connector
                .stream(name)
                .map(|s| s.name.as_str())
                .ok_or_else(|| Error::StreamNotFound {
                    stream: name.to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_connector_from_str;

    const CONNECTOR: &str = r"
name: demo
base_url: https://api.example.com
streams:
  - name: users
    request: {path: /users}
  - name: orders
    request: {path: /orders}
";

    #[test]
    fn test_select_all_streams() {
        let connector = load_connector_from_str(CONNECTOR).unwrap();
        assert_eq!(
            select_streams(&connector, None).unwrap(),
            vec!["users", "orders"]
        );
        assert_eq!(
            select_streams(&connector, Some(" ")).unwrap(),
            vec!["users", "orders"]
        );
    }

    #[test]
    fn test_select_named_streams() {
        let connector = load_connector_from_str(CONNECTOR).unwrap();
        assert_eq!(
            select_streams(&connector, Some("orders, users")).unwrap(),
            vec!["orders", "users"]
        );
    }

    #[test]
    fn test_select_unknown_stream() {
        let connector = load_connector_from_str(CONNECTOR).unwrap();
        assert!(matches!(
            select_streams(&connector, Some("users,invoices")),
            Err(Error::StreamNotFound { stream }) if stream == "invoices"
        ));
    }
}
