//! Authenticator implementation
//!
//! Applies the configured credentials to each request.

use super::types::{AuthConfig, Location};
use crate::error::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::RequestBuilder;

/// Supplies ready-to-use credentials for outgoing requests
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Decorate a request with credentials
    async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder>;
}

/// Authenticator handles applying authentication to HTTP requests
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    /// Auth configuration
    config: AuthConfig,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// The underlying auth configuration
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[async_trait]
impl AuthProvider for Authenticator {
    async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),

            AuthConfig::ApiKey {
                location,
                header_name,
                query_param,
                prefix,
                value,
            } => {
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                match location {
                    Location::Header => {
                        let header = header_name.as_deref().unwrap_or("Authorization");
                        Ok(req.header(header, val))
                    }
                    Location::Query => {
                        let param = query_param.as_deref().unwrap_or("api_key");
                        Ok(req.query(&[(param, val)]))
                    }
                }
            }

            AuthConfig::Basic { username, password } => {
                Ok(req.basic_auth(username, Some(password)))
            }

            AuthConfig::Bearer { token } => Ok(req.bearer_auth(token)),

            AuthConfig::Base64Token { token } => {
                Ok(req.header("Authorization", base64_basic_header(token)))
            }

            AuthConfig::CustomHeaders { headers } => {
                let mut req = req;
                for (key, value) in headers {
                    req = req.header(key.as_str(), value.as_str());
                }
                Ok(req)
            }
        }
    }
}

/// Encode a secret as a `Basic` authorization value
fn base64_basic_header(token: &str) -> String {
    if token.starts_with("Basic ") {
        return token.to_string();
    }
    format!("Basic {}", STANDARD.encode(token.as_bytes()))
}
