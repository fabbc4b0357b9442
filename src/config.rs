//! Binding Configuration
//!
//! Request defaults shared by every binding built from the same config:
//! negotiated media types, extra headers, and HTTP client limits.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! accept: application/hal+json
//! timeout_secs: 30
//! headers:
//!   fx.api.version: "1"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NucleonError, Result};

/// Request defaults for bindings and the HTTP transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BindingConfig {
    /// `Accept` header sent with every request
    pub accept: String,

    /// `Content-Type` of request bodies
    pub content_type: String,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// HTTP request timeout (none by default)
    pub timeout_secs: Option<u64>,

    /// Redirects followed by the HTTP transport
    pub max_redirects: usize,

    pub user_agent: String,

    /// Events kept in each binding's log (`0` = unbounded)
    pub max_events: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            accept: "application/hal+json".to_string(),
            content_type: "application/json".to_string(),
            headers: BTreeMap::new(),
            timeout_secs: None,
            max_redirects: 5,
            user_agent: format!("nucleon/{}", env!("CARGO_PKG_VERSION")),
            max_events: 1000,
        }
    }
}

impl BindingConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| NucleonError::Config {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Load configuration from a YAML file
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| NucleonError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
