//! Outbound requests to the target named by the `url` parameter.
//!
//! Each call issues exactly one GET with a browser-like header set and a
//! bounded timeout. Idle connections are not kept between requests.

use crate::config::UpstreamConfig;
use crate::relay::error::RelayError;
use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::Duration;
use url::Url;

/// Client for the relayed GET.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,

    /// Hosts the relay may contact; empty allows all
    allowed_hosts: Vec<String>,

    /// Total time allowed for connect, send and body read
    timeout: Duration,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout())
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            allowed_hosts: config
                .allowed_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            timeout: config.timeout(),
        })
    }

    /// Validates the raw `url` value before anything touches the network.
    pub fn parse_target(&self, raw: &str) -> Result<Url, RelayError> {
        let url = Url::parse(raw).map_err(|e| RelayError::InvalidUrl(e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| RelayError::InvalidUrl("missing host".to_string()))?;

        if !self.allowed_hosts.is_empty() && !self.allowed_hosts.iter().any(|h| h == host) {
            return Err(RelayError::HostNotAllowed(host.to_string()));
        }

        Ok(url)
    }

    /// GETs `target` and returns its body bytes untouched.
    ///
    /// Non-2xx statuses are reported as errors.
    pub async fn fetch(&self, target: &Url) -> Result<Bytes, RelayError> {
        let response = self
            .client
            .get(target.clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| self.classify(e))?;

        tracing::debug!(
            url = %target,
            status = response.status().as_u16(),
            "Upstream responded"
        );

        response.bytes().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            return RelayError::Timeout(format!(
                "no response within {} ms",
                self.timeout.as_millis()
            ));
        }

        // Alternate formatting keeps the cause chain (DNS, refused, TLS).
        RelayError::Upstream(format!("{:#}", anyhow::Error::new(err)))
    }
}
