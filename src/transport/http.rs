//! HTTP transport backed by `reqwest`

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use super::{Method, Request, Response, Transport};
use crate::config::BindingConfig;
use crate::error::{NucleonError, Result};

/// Default network transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn from_config(config: &BindingConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));

        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder.build().map_err(|e| NucleonError::Config {
            reason: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Patch => self.client.patch(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        tracing::debug!(method = %request.method, url = %request.url, "sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| NucleonError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| NucleonError::Transport(format!("Failed to read response: {}", e)))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_from_default_config() {
        let transport = HttpTransport::from_config(&BindingConfig::default()).unwrap();
        assert_eq!(transport.name(), "http");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let config = BindingConfig {
            timeout_secs: Some(2),
            ..BindingConfig::default()
        };
        let transport = HttpTransport::from_config(&config).unwrap();

        // Port 9 (discard) on localhost is never an HTTP server in CI
        let result = transport
            .send(Request::new(Method::Get, "http://127.0.0.1:9/x"))
            .await;

        assert!(matches!(result, Err(NucleonError::Transport(_))));
    }
}
