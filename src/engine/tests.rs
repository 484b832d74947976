//! Tests for engine module

use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig, RetryConfig};
use crate::pagination::{LinkCursorPaginator, PageSessionPaginator};
use crate::partition::Partition;
use crate::state::{CursorManager, CursorState, Namespace};
use crate::types::{CursorFormat, LogLevel, Record};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .retry(RetryConfig::new(
            2,
            Duration::from_millis(10),
            Duration::from_secs(2),
        ))
        .build();
    HttpClient::with_config(config).unwrap()
}

fn extractor(server: &MockServer) -> Extractor {
    Extractor::new(client_for(server), json!({"project_id": "p-1"}))
}

fn cursor_state(value: Value) -> CursorState {
    serde_json::from_value(value).unwrap()
}

fn records(messages: &[Message]) -> Vec<&Record> {
    messages.iter().filter_map(Message::as_record).collect()
}

fn ids(messages: &[Message]) -> Vec<Value> {
    records(messages).iter().map(|r| r["id"].clone()).collect()
}

fn states(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::State { data, .. } => Some(data.to_value()),
            _ => None,
        })
        .collect()
}

fn flows_stream() -> Stream {
    Stream::new("flows", "/flows")
        .with_records_path("data")
        .with_primary_key(vec!["id".to_string()])
        .with_paginator(Arc::new(LinkCursorPaginator::default()))
        .with_incremental(
            IncrementalSpec::new(CursorManager::new("flows", "updated", CursorFormat::Iso8601))
                .with_cursor_path("attributes.updated")
                .with_sort("sort", "updated"),
        )
}

fn flow(id: &str, updated: &str) -> Value {
    json!({"id": id, "attributes": {"updated": updated}})
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_message_kinds() {
    let record = Message::record("flows", Partition::new(), Record::new());
    assert!(record.is_record());
    assert!(!record.is_state());

    let state = Message::state("flows", CursorState::new());
    assert!(state.is_state());

    let log = Message::error("boom");
    assert!(log.is_log());
    assert!(log.as_record().is_none());
}

#[test]
fn test_message_json_shape() {
    let mut data = Record::new();
    data.insert("id".to_string(), json!(1));
    let message = Message::record("flows", Partition::new().with_value("channel", "email"), data);
    assert_eq!(
        message.to_json(),
        json!({"type": "RECORD", "stream": "flows", "partition": {"channel": "email"}, "data": {"id": 1}})
    );

    let log = Message::log(LogLevel::Warn, "slow");
    assert_eq!(log.to_json(), json!({"type": "LOG", "level": "WARN", "message": "slow"}));
}

#[test]
fn test_sync_config_builder() {
    let config = SyncConfig::new()
        .with_fail_fast(true)
        .with_checkpoint_interval(50)
        .with_max_records(10);

    assert!(config.fail_fast);
    assert_eq!(config.checkpoint_interval, Some(50));
    assert_eq!(config.max_records, Some(10));
    assert!(!SyncConfig::default().fail_fast);
}

#[test]
fn test_unknown_stream() {
    let config = HttpClientConfig::default();
    let extractor = Extractor::new(HttpClient::with_config(config).unwrap(), Value::Null);
    let err = extractor.read("missing", None).unwrap_err();
    assert!(matches!(err, Error::StreamNotFound { .. }));
}

// ============================================================================
// Pagination + Cursor
// ============================================================================

#[tokio::test]
async fn test_link_cursor_read_advances_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .and(query_param_is_missing("page[cursor]"))
        .and(query_param("filter", "greater-than(updated,2024-01-01T00:00:00Z)"))
        .and(query_param("sort", "updated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [flow("f1", "2024-01-03T00:00:00Z"), flow("f2", "2024-01-09T00:00:00Z")],
            "links": {"next": format!("{}/flows?page%5Bcursor%5D=abc", server.uri())}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .and(query_param("page[cursor]", "abc"))
        .and(query_param_is_missing("sort"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [flow("f3", "2024-01-05T00:00:00Z")],
            "links": {"next": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = extractor(&server).with_stream(flows_stream());
    let state = cursor_state(json!({"updated": "2024-01-01T00:00:00Z"}));
    let messages = extractor.read("flows", Some(state)).unwrap().collect().await.unwrap();

    assert_eq!(ids(&messages), vec![json!("f1"), json!("f2"), json!("f3")]);
    assert_eq!(records(&messages)[0]["updated"], "2024-01-03T00:00:00Z");
    assert_eq!(states(&messages), vec![json!({"updated": "2024-01-09T00:00:00Z"})]);
}

#[tokio::test]
async fn test_future_marker_is_clamped_in_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let extractor = extractor(&server).with_stream(flows_stream());
    let state = cursor_state(json!({"updated": "2999-01-01T00:00:00Z"}));
    let messages = extractor.read("flows", Some(state)).unwrap().collect().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let filter = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "filter")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert!(filter.starts_with("greater-than(updated,"));
    assert!(!filter.contains("2999"));

    // The stored marker itself is never lowered
    assert_eq!(states(&messages), vec![json!({"updated": "2999-01-01T00:00:00Z"})]);
}

#[tokio::test]
async fn test_record_without_cursor_is_emitted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "f1"}, flow("f2", "2024-02-01T00:00:00Z")]
        })))
        .mount(&server)
        .await;

    let extractor = extractor(&server).with_stream(flows_stream());
    let messages = extractor.read("flows", None).unwrap().collect().await.unwrap();

    assert_eq!(ids(&messages), vec![json!("f1"), json!("f2")]);
    assert_eq!(states(&messages), vec![json!({"updated": "2024-02-01T00:00:00Z"})]);
}

#[tokio::test]
async fn test_unparseable_cursor_fails_stream_after_earlier_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [flow("f1", "2024-02-01T00:00:00Z"), flow("f2", "yesterday")]
        })))
        .mount(&server)
        .await;

    let extractor = extractor(&server).with_stream(flows_stream());
    let mut reader = extractor.read("flows", None).unwrap();

    let first = reader.next_message().await.unwrap().unwrap();
    assert_eq!(first.as_record().unwrap()["id"], "f1");

    let err = reader.next_message().await.unwrap_err();
    assert!(matches!(err, Error::CursorParse { .. }));
    assert!(reader.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn test_page_session_token_replaces_computed_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/engage"))
        .and(query_param_is_missing("page"))
        .and(query_param("project_id", "p-1"))
        .and(query_param("filter", "greater-than(updated,2024-01-01T00:00:00Z)"))
        .and(query_param("sort", "updated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 0, "total": 3, "session_id": "s-1",
            "results": [
                {"id": 1, "updated": "2024-01-10T00:00:00Z"},
                {"id": 2, "updated": "2024-02-02T00:00:00Z"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/engage"))
        .and(query_param("page", "1"))
        .and(query_param("session_id", "s-1"))
        .and(query_param("project_id", "p-1"))
        .and(query_param_is_missing("filter"))
        .and(query_param_is_missing("sort"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1, "session_id": "s-1",
            "results": [{"id": 3, "updated": "2024-01-15T00:00:00Z"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stream = Stream::new("engage", "/engage")
        .with_records_path("results")
        .with_param("project_id", "{{ config.project_id }}")
        .with_paginator(Arc::new(PageSessionPaginator::new(2)))
        .with_incremental(
            IncrementalSpec::new(CursorManager::new("engage", "updated", CursorFormat::Iso8601))
                .with_sort("sort", "updated"),
        );

    let extractor = extractor(&server).with_stream(stream);
    let state = cursor_state(json!({"updated": "2024-01-01T00:00:00Z"}));
    let messages = extractor.read("engage", Some(state)).unwrap().collect().await.unwrap();

    assert_eq!(ids(&messages), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(states(&messages), vec![json!({"updated": "2024-02-02T00:00:00Z"})]);
}

// ============================================================================
// Archived Pass
// ============================================================================

#[tokio::test]
async fn test_archived_pass_after_primary() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .and(query_param("filter", "greater-than(updated,2024-01-01T00:00:00Z)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [flow("f1", "2024-01-04T00:00:00Z")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .and(query_param("filter", "equals(archived,true)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "f0", "attributes": {"updated": "2023-12-01T00:00:00Z", "archived": true}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut stream = flows_stream().with_archived(ArchivedSpec::default());
    if let Some(incremental) = stream.incremental.as_mut() {
        incremental.cursor = incremental
            .cursor
            .clone()
            .with_archived_flag(crate::state::DEFAULT_ARCHIVED_FLAG);
    }

    let extractor = extractor(&server).with_stream(stream);
    let state = cursor_state(json!({"updated": "2024-01-01T00:00:00Z"}));
    let mut reader = extractor.read("flows", Some(state)).unwrap();

    let mut messages = Vec::new();
    while let Some(message) = reader.next_message().await.unwrap() {
        messages.push(message);
    }

    assert_eq!(ids(&messages), vec![json!("f1"), json!("f0")]);
    assert_eq!(
        reader.cursor_state().to_value(),
        json!({"updated": "2024-01-04T00:00:00Z", "archived": {"updated": "2023-12-01T00:00:00Z"}})
    );
    assert_eq!(reader.cursor_state().get(Namespace::Archived, "updated"), Some(&json!("2023-12-01T00:00:00Z")));
    assert_eq!(reader.stats().partitions_synced, 1);
    assert_eq!(reader.stats().pages_fetched, 2);
}

// ============================================================================
// Partitions
// ============================================================================

#[tokio::test]
async fn test_partition_failure_is_logged_and_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/campaigns"))
        .and(query_param("filter", "equals(messages.channel,'email')"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{"detail": "Channel unavailable"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/campaigns"))
        .and(query_param("filter", "equals(messages.channel,'sms')"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "c1"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let stream = Stream::new("campaigns", "/campaigns")
        .with_records_path("data")
        .with_filter("equals(messages.channel,'{{ partition.channel }}')")
        .with_partition(PartitionSpec::List {
            values: vec![json!("email"), json!("sms")],
            partition_field: "channel".to_string(),
        });

    let extractor = extractor(&server).with_stream(stream);
    let mut reader = extractor.read("campaigns", None).unwrap();
    let mut messages = Vec::new();
    while let Some(message) = reader.next_message().await.unwrap() {
        messages.push(message);
    }

    match &messages[0] {
        Message::Log { level, message } => {
            assert_eq!(*level, LogLevel::Error);
            assert!(message.contains("campaigns"));
            assert!(message.contains("email"));
            assert!(message.contains("Channel unavailable"));
        }
        other => panic!("expected error log, got {other:?}"),
    }
    assert_eq!(ids(&messages), vec![json!("c1")]);
    match &messages[1] {
        Message::Record { partition, .. } => assert_eq!(partition.get("channel"), Some(&json!("sms"))),
        other => panic!("expected record, got {other:?}"),
    }
    assert_eq!(reader.stats().errors, 1);
    assert_eq!(reader.stats().partitions_synced, 1);
}

#[tokio::test]
async fn test_each_partition_filters_from_run_start_state() {
    let server = MockServer::start().await;

    for (channel, id, updated) in [
        ("email", "e1", "2024-03-01T00:00:00Z"),
        ("sms", "s1", "2024-02-01T00:00:00Z"),
    ] {
        Mock::given(method("GET"))
            .and(path("/campaigns"))
            .and(query_param(
                "filter",
                format!(
                    "greater-than(updated,2024-01-01T00:00:00Z),equals(messages.channel,'{channel}')"
                ),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": id, "updated": updated}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let stream = Stream::new("campaigns", "/campaigns")
        .with_records_path("data")
        .with_filter("equals(messages.channel,'{{ partition.channel }}')")
        .with_incremental(IncrementalSpec::new(CursorManager::new(
            "campaigns",
            "updated",
            CursorFormat::Iso8601,
        )))
        .with_partition(PartitionSpec::List {
            values: vec![json!("email"), json!("sms")],
            partition_field: "channel".to_string(),
        });

    let extractor = extractor(&server).with_stream(stream);
    let state = cursor_state(json!({"updated": "2024-01-01T00:00:00Z"}));
    let messages = extractor.read("campaigns", Some(state)).unwrap().collect().await.unwrap();

    assert_eq!(ids(&messages), vec![json!("e1"), json!("s1")]);
    assert_eq!(
        states(&messages),
        vec![
            json!({"updated": "2024-03-01T00:00:00Z"}),
            json!({"updated": "2024-03-01T00:00:00Z"})
        ]
    );
}

#[tokio::test]
async fn test_fail_fast_propagates_partition_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/campaigns"))
        .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
        .mount(&server)
        .await;

    let stream = Stream::new("campaigns", "/campaigns").with_partition(PartitionSpec::List {
        values: vec![json!("email"), json!("sms")],
        partition_field: "channel".to_string(),
    });

    let extractor = extractor(&server)
        .with_stream(stream)
        .with_sync_config(SyncConfig::new().with_fail_fast(true));
    let err = extractor.read("campaigns", None).unwrap().collect().await.unwrap_err();
    assert!(matches!(err, Error::Client { status: 404, .. }));
}

#[tokio::test]
async fn test_fatal_rate_limit_aborts_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/campaigns"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
        .expect(1)
        .mount(&server)
        .await;

    let stream = Stream::new("campaigns", "/campaigns").with_partition(PartitionSpec::List {
        values: vec![json!("email"), json!("sms")],
        partition_field: "channel".to_string(),
    });

    let extractor = extractor(&server).with_stream(stream);
    let err = extractor.read("campaigns", None).unwrap().collect().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_parent_partitions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cohorts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 10, "name": "early"},
            {"name": "no id"},
            {"id": 20, "name": "late"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    for (cohort, member) in [(10, "m1"), (20, "m2")] {
        Mock::given(method("GET"))
            .and(path(format!("/cohorts/{cohort}/members")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": member}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let parent = Arc::new(Stream::new("cohorts", "/cohorts"));
    let child = Stream::new("cohort_members", "/cohorts/{{ partition.cohort_id }}/members")
        .with_records_path("results")
        .with_partition(PartitionSpec::Parent {
            parent: parent.clone(),
            field_path: "id".to_string(),
            partition_field: "cohort_id".to_string(),
            label: Some(("cohort_name".to_string(), "name".to_string())),
        });

    let extractor = extractor(&server).with_stream(parent).with_stream(child);
    let messages = extractor
        .read("cohort_members", None)
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(ids(&messages), vec![json!("m1"), json!("m2")]);
    let partitions: Vec<Value> = messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { partition, .. } => Some(partition.to_value()),
            _ => None,
        })
        .collect();
    assert_eq!(
        partitions,
        vec![
            json!({"cohort_id": 10, "cohort_name": "early", "parent_slice": {}}),
            json!({"cohort_id": 20, "cohort_name": "late", "parent_slice": {}}),
        ]
    );
}

// ============================================================================
// Checkpoints and Limits
// ============================================================================

#[tokio::test]
async fn test_checkpoint_interval() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                flow("f1", "2024-01-01T00:00:00Z"),
                flow("f2", "2024-01-02T00:00:00Z"),
                flow("f3", "2024-01-03T00:00:00Z")
            ]
        })))
        .mount(&server)
        .await;

    let extractor = extractor(&server).with_stream(flows_stream().with_checkpoint_interval(2));
    let messages = extractor.read("flows", None).unwrap().collect().await.unwrap();

    assert_eq!(
        states(&messages),
        vec![
            json!({"updated": "2024-01-02T00:00:00Z"}),
            json!({"updated": "2024-01-03T00:00:00Z"}),
        ]
    );
    assert!(messages[2].is_state());
}

#[tokio::test]
async fn test_max_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                flow("f1", "2024-01-01T00:00:00Z"),
                flow("f2", "2024-01-02T00:00:00Z"),
                flow("f3", "2024-01-03T00:00:00Z")
            ],
            "links": {"next": format!("{}/flows?page%5Bcursor%5D=more", server.uri())}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = extractor(&server)
        .with_stream(flows_stream())
        .with_sync_config(SyncConfig::new().with_max_records(2));
    let messages = extractor.read("flows", None).unwrap().collect().await.unwrap();

    assert_eq!(ids(&messages), vec![json!("f1"), json!("f2")]);
    assert_eq!(states(&messages), vec![json!({"updated": "2024-01-02T00:00:00Z"})]);
}

#[tokio::test]
async fn test_into_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [flow("f1", "2024-01-01T00:00:00Z")]
        })))
        .mount(&server)
        .await;

    let extractor = extractor(&server).with_stream(flows_stream());
    let messages: Vec<Message> = extractor
        .read("flows", None)
        .unwrap()
        .into_stream()
        .map(|m| m.unwrap())
        .collect()
        .await;

    assert_eq!(messages.len(), 2);
    assert!(messages[0].is_record());
    assert!(messages[1].is_state());
}
