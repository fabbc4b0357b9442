//! # Transport Abstraction Layer
//!
//! How a binding talks to the resource server.
//!
//! - [`Transport`] - Core trait: one request in, one response out
//! - [`HttpTransport`] - Production transport using `reqwest`
//! - [`MockTransport`] - Test transport with queued and deferred responses
//!
//! A non-2xx [`Response`] is not an error at this layer; the binding decides
//! what it means. `Err` is reserved for requests that never got an answer.
//!
//! ## Creating Transports
//!
//! ```rust
//! use nucleon::config::BindingConfig;
//! use nucleon::transport::create_transport;
//!
//! let http = create_transport("http", &BindingConfig::default());
//! assert!(http.is_ok());
//!
//! let unknown = create_transport("carrier-pigeon", &BindingConfig::default());
//! assert!(unknown.is_err());
//! ```

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockTransport, Responder};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BindingConfig;
use crate::error::{NucleonError, Result};

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request built by a binding
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// JSON body (POST/PATCH)
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Answer from the server (or from an interceptor)
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// JSON response with `content-type: application/json`
    pub fn json(status: u16, body: &Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response
    }

    /// Empty response (e.g. 204 after DELETE)
    pub fn empty(status: u16) -> Self {
        Self::new(status, String::new())
    }

    /// 2xx status
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON; `None` for an empty body
    pub fn json_value(&self) -> Result<Option<Value>> {
        if self.body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.body)?))
    }

    /// Header value by name, ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// TRANSPORT TRAIT (ASYNC)
// ============================================================================

/// Sends binding requests over some channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the transport name (e.g., "http", "mock")
    fn name(&self) -> &str;

    /// Send one request and wait for its response
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Create a transport instance by name
///
/// | Name | Description |
/// |------|-------------|
/// | `http` | Real network calls via `reqwest` |
/// | `mock` | Empty [`MockTransport`] (every request fails until routes are added) |
pub fn create_transport(name: &str, config: &BindingConfig) -> Result<Arc<dyn Transport>> {
    match name.to_lowercase().as_str() {
        "http" => Ok(Arc::new(HttpTransport::from_config(config)?)),
        "mock" => Ok(Arc::new(MockTransport::new())),
        _ => Err(NucleonError::Config {
            reason: format!("Unknown transport: '{}'. Available: http, mock", name),
        }),
    }
}
