//! Record reader
//!
//! [`RecordReader`] drives one stream read as a pull-based state machine:
//! partitions are taken from the router one at a time, each partition is
//! paged to exhaustion (then paged again for archived records when the
//! stream asks for it), and every record advances the cursor before it is
//! handed out. Messages come out in extraction order.
//!
//! Requests are always filtered by the state the read started from, so a
//! marker advanced by one partition never narrows another.

use super::stream::Stream;
use super::types::{Message, SyncConfig, SyncStats};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{PaginationState, PaginationToken};
use crate::partition::{ParentSource, Partition, PartitionRouter};
use crate::state::{CursorState, Namespace};
use crate::template::{self, TemplateContext};
use crate::types::{lookup_record, JsonObject, Record, SyncMode};
use async_trait::async_trait;
use chrono::Utc;
use futures::Stream as FuturesStream;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where the reader is in its walk over partitions and pages
#[derive(Debug)]
enum Phase {
    NextPartition,
    Paging {
        partition: Partition,
        namespace: Namespace,
        pagination: PaginationState,
        token: Option<PaginationToken>,
    },
    Done,
}

/// Pull-based reader over one stream
pub struct RecordReader {
    stream: Arc<Stream>,
    client: HttpClient,
    config: Value,
    sync: SyncConfig,
    mode: SyncMode,
    router: Box<dyn PartitionRouter>,
    /// State as of the start of the read; request filters are built from it
    start_cursor: CursorState,
    cursor: CursorState,
    queue: VecDeque<Message>,
    phase: Phase,
    pending_error: Option<Error>,
    stats: SyncStats,
    since_checkpoint: usize,
}

impl RecordReader {
    /// Create a reader; `cursor` is the stream's persisted state
    pub fn new(
        stream: Arc<Stream>,
        client: HttpClient,
        config: Value,
        router: Box<dyn PartitionRouter>,
        cursor: CursorState,
        mode: SyncMode,
    ) -> Self {
        Self {
            stream,
            client,
            config,
            sync: SyncConfig::default(),
            mode,
            router,
            start_cursor: cursor.clone(),
            cursor,
            queue: VecDeque::new(),
            phase: Phase::NextPartition,
            pending_error: None,
            stats: SyncStats::default(),
            since_checkpoint: 0,
        }
    }

    /// Set read options
    #[must_use]
    pub fn with_sync_config(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Stream being read
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Latest cursor state snapshot
    pub fn cursor_state(&self) -> CursorState {
        self.cursor.clone()
    }

    /// Read statistics so far
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Next message, or `None` once the read is complete
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(message) = self.queue.pop_front() {
                return Ok(Some(message));
            }
            if let Some(e) = self.pending_error.take() {
                return Err(e);
            }

            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return Ok(None),
                Phase::NextPartition => match self.router.next_partition().await? {
                    Some(partition) => {
                        info!(stream = %self.stream.name, partition = %partition, "Reading partition");
                        self.phase = Phase::Paging {
                            partition,
                            namespace: Namespace::Primary,
                            pagination: PaginationState::new(),
                            token: None,
                        };
                    }
                    None => {
                        info!(
                            stream = %self.stream.name,
                            records = self.stats.records_synced,
                            pages = self.stats.pages_fetched,
                            partitions = self.stats.partitions_synced,
                            errors = self.stats.errors,
                            "Stream complete"
                        );
                    }
                },
                Phase::Paging {
                    partition,
                    namespace,
                    mut pagination,
                    token,
                } => {
                    let page = self
                        .fetch_page(&partition, namespace, &mut pagination, token.as_ref())
                        .await;
                    self.phase = match page {
                        Ok(_) if self.limit_reached() => {
                            info!(stream = %self.stream.name, "Record limit reached");
                            self.push_state();
                            Phase::Done
                        }
                        Ok(Some(token)) => Phase::Paging {
                            partition,
                            namespace,
                            pagination,
                            token: Some(token),
                        },
                        Ok(None) => self.finish_pass(partition, namespace),
                        Err(e) => self.fail_partition(e, &partition),
                    };
                }
            }
        }
    }

    /// Adapt the reader into a `futures::Stream`
    pub fn into_stream(self) -> impl FuturesStream<Item = Result<Message>> + Send {
        futures::stream::unfold(self, |mut reader| async move {
            match reader.next_message().await {
                Ok(Some(message)) => Some((Ok(message), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }

    /// Drain the reader into a vector
    pub async fn collect(mut self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    // ========================================================================
    // Paging
    // ========================================================================

    /// Fetch one page, queue its records, and return the next token
    async fn fetch_page(
        &mut self,
        partition: &Partition,
        namespace: Namespace,
        pagination: &mut PaginationState,
        token: Option<&PaginationToken>,
    ) -> Result<Option<PaginationToken>> {
        let ctx = self.template_context(partition, namespace);
        let path = template::render(&self.stream.request.path, &ctx)?;
        let request = self.compose_request(&ctx, namespace, token)?;

        let response = self
            .client
            .request(self.stream.request.method, &path, &request)
            .await?;
        self.stats.add_page();

        let records = self.stream.decoder.decode(&response.body)?;
        pagination.record_page(records.len());
        let next = self
            .stream
            .paginator
            .next_token(&response.body, &records, pagination);

        debug!(
            stream = %self.stream.name,
            partition = %partition,
            archived = (namespace == Namespace::Archived),
            page = pagination.pages,
            records = records.len(),
            "Fetched page"
        );

        for record in records {
            if self.limit_reached() {
                break;
            }
            self.emit_record(partition, record)?;
        }

        if self.limit_reached() {
            return Ok(None);
        }
        Ok(next)
    }

    /// Lift and advance the cursor, then queue the record
    fn emit_record(&mut self, partition: &Partition, mut record: Record) -> Result<()> {
        if let Some(incremental) = &self.stream.incremental {
            if let Some(path) = &incremental.cursor_path {
                if let Some(value) = lookup_record(&record, path).cloned() {
                    record.insert(incremental.cursor.field().to_string(), value);
                }
            }
            if self.mode == SyncMode::Incremental {
                incremental.cursor.advance(&mut self.cursor, &record)?;
            }
        }

        self.queue
            .push_back(Message::record(&self.stream.name, partition.clone(), record));
        self.stats.add_record();
        self.since_checkpoint += 1;

        if let Some(every) = self.checkpoint_interval() {
            if self.since_checkpoint >= every {
                self.push_state();
            }
        }
        Ok(())
    }

    /// Compose query, headers and body for the next request
    fn compose_request(
        &self,
        ctx: &TemplateContext,
        namespace: Namespace,
        token: Option<&PaginationToken>,
    ) -> Result<RequestConfig> {
        let spec = &self.stream.request;
        let mut query = BTreeMap::new();

        for (key, value) in &spec.params {
            let rendered = template::render(value, ctx)?;
            if !rendered.is_empty() {
                query.insert(key.clone(), rendered);
            }
        }

        // A token replaces everything computed below; base params stay
        if let Some(token) = token {
            query.extend(token.iter().map(|(k, v)| (k.clone(), v.clone())));
        } else {
            for (key, value) in self.stream.paginator.initial_params() {
                query.entry(key).or_insert(value);
            }

            let filters = self.filter_clauses(ctx, namespace)?;
            if !filters.is_empty() {
                query.insert(spec.filter_param.clone(), filters.join(","));
            }

            let sort = self.stream.incremental.as_ref().and_then(|i| i.sort.as_ref());
            if let Some((param, value)) = sort {
                query.insert(param.clone(), value.clone());
            }
        }

        let mut request = RequestConfig::new();
        for (key, value) in query {
            request = request.query(key, value);
        }
        for (key, value) in &spec.headers {
            request = request.header(key.clone(), template::render(value, ctx)?);
        }
        if let Some(body) = &spec.body {
            request = request.json(template::render_value(body, ctx)?);
        }
        Ok(request)
    }

    /// Cursor clause, static filters, then the archived clause
    fn filter_clauses(&self, ctx: &TemplateContext, namespace: Namespace) -> Result<Vec<String>> {
        let mut clauses = Vec::new();

        if self.mode == SyncMode::Incremental {
            if let Some(incremental) = &self.stream.incremental {
                if let Some(clause) =
                    incremental
                        .cursor
                        .filter_clause(&self.start_cursor, namespace, Utc::now())?
                {
                    clauses.push(clause);
                }
            }
        }

        for filter in &self.stream.request.filters {
            let rendered = template::render(filter, ctx)?;
            if !rendered.is_empty() {
                clauses.push(rendered);
            }
        }

        if namespace == Namespace::Archived {
            if let Some(archived) = &self.stream.archived {
                clauses.push(archived.filter.clone());
            }
        }

        Ok(clauses)
    }

    fn template_context(&self, partition: &Partition, namespace: Namespace) -> TemplateContext {
        let markers = match namespace {
            Namespace::Primary => self.start_cursor.values.clone(),
            Namespace::Archived => self
                .start_cursor
                .archived
                .clone()
                .unwrap_or_else(JsonObject::new),
        };

        let mut ctx = TemplateContext::with_config(self.config.clone());
        ctx.set_partition(partition.to_value())
            .set_stream_state(Value::Object(markers));
        ctx
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// A pass over the partition ran out of pages
    fn finish_pass(&mut self, partition: Partition, namespace: Namespace) -> Phase {
        if namespace == Namespace::Primary && self.stream.archived.is_some() {
            debug!(stream = %self.stream.name, partition = %partition, "Reading archived records");
            return Phase::Paging {
                partition,
                namespace: Namespace::Archived,
                pagination: PaginationState::new(),
                token: None,
            };
        }

        self.stats.add_partition();
        self.push_state();
        Phase::NextPartition
    }

    /// Log a partition-scoped failure and move on, or stop the read
    fn fail_partition(&mut self, e: Error, partition: &Partition) -> Phase {
        if !e.is_partition_scoped() || self.sync.fail_fast {
            error!(stream = %self.stream.name, partition = %partition, error = %e, "Stream read failed");
            self.pending_error = Some(e);
            return Phase::Done;
        }

        self.stats.add_error();
        error!(stream = %self.stream.name, partition = %partition, error = %e, "Partition failed, continuing");
        self.queue.push_back(Message::error(format!(
            "Stream '{}' partition {partition} failed: {e}",
            self.stream.name
        )));
        self.push_state();
        Phase::NextPartition
    }

    /// Queue a checkpoint of the cursor state
    fn push_state(&mut self) {
        self.since_checkpoint = 0;
        if self.tracks_state() {
            self.queue
                .push_back(Message::state(&self.stream.name, self.cursor.clone()));
        }
    }

    fn tracks_state(&self) -> bool {
        self.mode == SyncMode::Incremental && self.stream.is_incremental()
    }

    fn checkpoint_interval(&self) -> Option<usize> {
        self.sync
            .checkpoint_interval
            .or(self.stream.checkpoint_interval)
            .filter(|every| *every > 0)
    }

    fn limit_reached(&self) -> bool {
        self.sync
            .max_records
            .is_some_and(|max| self.stats.records_synced >= max)
    }
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("stream", &self.stream.name)
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .field("cursor", &self.cursor)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ParentSource for RecordReader {
    async fn next_message(&mut self) -> Result<Option<Message>> {
        RecordReader::next_message(self).await
    }
}
