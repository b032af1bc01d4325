//! Backend API keys.
//!
//! Keys live in a `secrecy` box and only leave it at the request header.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// An API key that never shows up in `Debug` output or logs.
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(SecretBox::new(Box::from(key.trim())))
    }

    /// Raw key, for the auth header of one request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Key, model and endpoint for one backend.
#[derive(Debug, Clone)]
pub struct BackendCredentials {
    pub api_key: ApiKey,
    pub model: String,
    /// Endpoint override (proxies, regional gateways)
    pub base_url: Option<String>,
}

impl BackendCredentials {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: Option<String>) -> Self {
        self.base_url = url.map(|u| u.trim_end_matches('/').to_string());
        self
    }
}
