//! Authentication module
//!
//! Supports: API Key, Basic, Bearer, Base64 token, Custom Headers
//!
//! Credentials are constructed by the caller; the engine only asks an
//! [`AuthProvider`] to decorate each outgoing request. The provider is
//! consulted on every attempt, including retries, so rotating credentials
//! are picked up without restarting a read.

mod authenticator;
mod types;

pub use authenticator::{AuthProvider, Authenticator};
pub use types::{AuthConfig, Location};

#[cfg(test)]
mod tests;
