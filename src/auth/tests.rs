//! Tests for the auth module

use super::*;
use base64::Engine;
use std::collections::HashMap;

fn build(req: reqwest::RequestBuilder) -> reqwest::Request {
    req.build().unwrap()
}

#[tokio::test]
async fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    assert!(build(req).headers().get("Authorization").is_none());
}

#[tokio::test]
async fn test_api_key_header_with_prefix() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        location: Location::Header,
        header_name: Some("Authorization".to_string()),
        query_param: None,
        prefix: Some("Klaviyo-API-Key ".to_string()),
        value: "pk_123".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    assert_eq!(
        build(req).headers().get("Authorization").unwrap(),
        "Klaviyo-API-Key pk_123"
    );
}

#[tokio::test]
async fn test_api_key_query() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        location: Location::Query,
        header_name: None,
        query_param: Some("apikey".to_string()),
        prefix: None,
        value: "secret123".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    assert!(build(req)
        .url()
        .query()
        .unwrap()
        .contains("apikey=secret123"));
}

#[tokio::test]
async fn test_basic_auth() {
    let auth = Authenticator::new(AuthConfig::Basic {
        username: "user".to_string(),
        password: "pass".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("user:pass")
    );
    assert_eq!(build(req).headers().get("Authorization").unwrap(), &expected);
}

#[tokio::test]
async fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        token: "tok".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    assert_eq!(
        build(req).headers().get("Authorization").unwrap(),
        "Bearer tok"
    );
}

#[tokio::test]
async fn test_base64_token_encodes_secret() {
    let auth = Authenticator::new(AuthConfig::Base64Token {
        token: "api-secret".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("api-secret")
    );
    assert_eq!(build(req).headers().get("Authorization").unwrap(), &expected);
}

#[tokio::test]
async fn test_base64_token_keeps_encoded_value() {
    let auth = Authenticator::new(AuthConfig::Base64Token {
        token: "Basic YWJj".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    assert_eq!(
        build(req).headers().get("Authorization").unwrap(),
        "Basic YWJj"
    );
}

#[tokio::test]
async fn test_custom_headers() {
    let mut headers = HashMap::new();
    headers.insert("X-Custom-Auth".to_string(), "value1".to_string());
    headers.insert("Revision".to_string(), "2024-02-15".to_string());

    let auth = Authenticator::new(AuthConfig::CustomHeaders { headers });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    let built = build(req);
    assert_eq!(built.headers().get("X-Custom-Auth").unwrap(), "value1");
    assert_eq!(built.headers().get("Revision").unwrap(), "2024-02-15");
}
