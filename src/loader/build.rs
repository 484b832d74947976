//! Runtime construction from connector definitions
//!
//! Renders `{{ config.* }}` templates in auth and connection settings and
//! turns each stream definition into an engine [`Stream`]. Request templates
//! stay unrendered; the reader renders them per request.

use super::types::{
    AuthDefinition, ConnectorDefinition, HttpDefinition, IncrementalDefinition, StreamDefinition,
};
use crate::auth::{AuthConfig, Authenticator, Location};
use crate::decode::JsonDecoder;
use crate::engine::{
    ArchivedSpec, Extractor, IncrementalSpec, PartitionSpec, RequestSpec, Stream, SyncConfig,
};
use crate::error::{Error, Result};
use crate::http::{
    DefaultClassifier, ErrorClassifier, ErrorCodeClassifier, HttpClient, HttpClientConfig,
    RateLimiterConfig, RetryConfig,
};
use crate::partition::PartitionConfig;
use crate::state::CursorManager;
use crate::template::{self, TemplateContext};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

impl ConnectorDefinition {
    /// Build an extractor over every stream, with `config` as template input
    pub fn extractor(&self, config: Value, sync: SyncConfig) -> Result<Extractor> {
        let client = self.build_client(&config)?;
        let streams = self.build_streams(&config)?;

        Ok(streams
            .into_iter()
            .fold(Extractor::new(client, config), |extractor, stream| {
                extractor.with_stream(stream)
            })
            .with_sync_config(sync))
    }

    /// Build the HTTP client: base URL, headers, retry, quota, auth
    pub fn build_client(&self, config: &Value) -> Result<HttpClient> {
        let ctx = TemplateContext::with_config(config.clone());

        let mut builder = HttpClientConfig::builder()
            .base_url(template::render(&self.base_url, &ctx)?)
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .retry(retry_config(&self.http)?);

        if let Some(limit) = &self.http.rate_limit {
            let mut quota = RateLimiterConfig {
                requests: limit.requests,
                period: limit.period,
                burst_size: None,
            };
            if let Some(burst) = limit.burst {
                quota = quota.burst(burst);
            }
            builder = builder.rate_limit(quota);
        }

        if let Some(agent) = &self.http.user_agent {
            builder = builder.user_agent(agent.clone());
        }

        for (key, value) in &self.headers {
            builder = builder.header(key.clone(), template::render(value, &ctx)?);
        }

        let auth = match &self.auth {
            Some(def) => render_auth(def, &ctx)?,
            None => AuthConfig::None,
        };
        debug!(connector = %self.name, auth = auth.kind(), "Building HTTP client");

        Ok(HttpClient::with_config(builder.build())?
            .with_auth(Arc::new(Authenticator::new(auth)))
            .with_classifier(classifier(&self.http)))
    }

    /// Build every stream; parents are shared between their children
    pub fn build_streams(&self, config: &Value) -> Result<Vec<Arc<Stream>>> {
        let mut built = HashMap::new();
        self.streams
            .iter()
            .map(|def| self.build_stream(def, config, &mut built))
            .collect()
    }

    fn build_stream(
        &self,
        def: &StreamDefinition,
        config: &Value,
        built: &mut HashMap<String, Arc<Stream>>,
    ) -> Result<Arc<Stream>> {
        if let Some(stream) = built.get(&def.name) {
            return Ok(stream.clone());
        }

        let request = &def.request;
        let mut stream = Stream::new(&def.name, &request.path)
            .with_request(RequestSpec {
                method: request.method.parse()?,
                path: request.path.clone(),
                params: request.params.clone(),
                filters: request.filters.clone(),
                filter_param: request.filter_param.clone(),
                headers: request.headers.clone(),
                body: request.body.clone(),
            })
            .with_primary_key(def.primary_key.clone())
            .with_paginator(def.pagination.build());

        if let Some(path) = &def.records_path {
            stream.decoder = Arc::new(JsonDecoder::with_path(path));
        }

        if let Some(every) = def.checkpoint_interval {
            stream = stream.with_checkpoint_interval(every);
        }

        if let Some(incremental) = &def.incremental {
            let mut cursor = cursor_manager(&def.name, incremental, config)?;
            if let Some(archived) = &def.archived {
                cursor = cursor.with_archived_flag(archived.flag_path.clone());
            }

            let mut spec = IncrementalSpec::new(cursor);
            if let Some(path) = &incremental.cursor_path {
                spec = spec.with_cursor_path(path.clone());
            }
            if let Some(param) = &incremental.sort_param {
                let value = incremental
                    .sort_value
                    .clone()
                    .unwrap_or_else(|| incremental.cursor_field.clone());
                spec = spec.with_sort(param.clone(), value);
            }
            stream = stream.with_incremental(spec);
        }

        if let Some(archived) = &def.archived {
            stream = stream.with_archived(ArchivedSpec {
                filter: archived.filter.clone(),
            });
        }

        stream = stream.with_partition(match &def.partition {
            PartitionConfig::None => PartitionSpec::None,
            PartitionConfig::List {
                values,
                partition_field,
            } => PartitionSpec::List {
                values: values.clone(),
                partition_field: partition_field.clone(),
            },
            PartitionConfig::Parent {
                parent_stream,
                field_path,
                partition_field,
                label_field,
                label_path,
            } => {
                let parent_def = self.stream(parent_stream).ok_or_else(|| Error::StreamNotFound {
                    stream: parent_stream.clone(),
                })?;
                PartitionSpec::Parent {
                    parent: self.build_stream(parent_def, config, built)?,
                    field_path: field_path.clone(),
                    partition_field: partition_field.clone(),
                    label: label_field
                        .clone()
                        .map(|key| (key, label_path.clone().unwrap_or_else(|| field_path.clone()))),
                }
            }
        });

        let stream = Arc::new(stream);
        built.insert(def.name.clone(), stream.clone());
        Ok(stream)
    }
}

fn retry_config(http: &HttpDefinition) -> Result<RetryConfig> {
    let factor = Duration::try_from_secs_f64(http.retry.factor_secs.max(0.0)).map_err(|e| {
        Error::InvalidConfigValue {
            field: "http.retry.factor_secs".to_string(),
            message: e.to_string(),
        }
    })?;

    Ok(RetryConfig::new(
        http.retry.max_tries,
        factor,
        Duration::from_secs(http.retry.max_time_secs),
    ))
}

fn classifier(http: &HttpDefinition) -> Arc<dyn ErrorClassifier> {
    let retry = &http.retry;
    if retry.limit_codes.is_empty() {
        return Arc::new(DefaultClassifier);
    }

    let field = retry.error_code_field.as_deref().unwrap_or("code");
    Arc::new(
        ErrorCodeClassifier::new(field, retry.limit_codes.clone())
            .on_statuses(retry.limit_statuses.clone()),
    )
}

fn cursor_manager(
    stream: &str,
    def: &IncrementalDefinition,
    config: &Value,
) -> Result<CursorManager> {
    let cursor = CursorManager::new(stream, &def.cursor_field, def.format)
        .with_filter_template(def.filter_template.clone());

    let Some(start) = &def.start_date else {
        return Ok(cursor);
    };

    match template::render(start, &TemplateContext::with_config(config.clone())) {
        Ok(rendered) if rendered.trim().is_empty() => Ok(cursor),
        Ok(rendered) => cursor.with_start_str(rendered.trim()),
        Err(Error::UndefinedVariable { variable }) => {
            debug!(stream, %variable, "Start date not configured");
            Ok(cursor)
        }
        Err(e) => Err(e),
    }
}

fn render_auth(def: &AuthDefinition, ctx: &TemplateContext) -> Result<AuthConfig> {
    Ok(match def {
        AuthDefinition::None => AuthConfig::None,
        AuthDefinition::ApiKey {
            key,
            value,
            location,
            prefix,
        } => AuthConfig::ApiKey {
            location: *location,
            header_name: (*location == Location::Header).then(|| key.clone()),
            query_param: (*location == Location::Query).then(|| key.clone()),
            prefix: prefix.clone(),
            value: template::render(value, ctx)?,
        },
        AuthDefinition::Bearer { token } => AuthConfig::Bearer {
            token: template::render(token, ctx)?,
        },
        AuthDefinition::Basic { username, password } => AuthConfig::Basic {
            username: template::render(username, ctx)?,
            password: template::render(password, ctx)?,
        },
        AuthDefinition::Base64Token { token } => AuthConfig::Base64Token {
            token: template::render(token, ctx)?,
        },
        AuthDefinition::CustomHeaders { headers } => AuthConfig::CustomHeaders {
            headers: headers
                .iter()
                .map(|(k, v)| Ok((k.clone(), template::render(v, ctx)?)))
                .collect::<Result<_>>()?,
        },
    })
}
