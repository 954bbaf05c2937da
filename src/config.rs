//! Relay configuration.
//!
//! Values come from built-in defaults, then an optional YAML file named by
//! `RELAY_CONFIG`, then the `LISTEN` and `UPSTREAM_TIMEOUT_MS` environment
//! variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3001";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// How the outer HTTP status is chosen for error outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Always answer 200 and carry failures in the JSON body.
    #[default]
    Compat,
    /// 400 for client mistakes, 502/504 for upstream failures.
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Hosts the relay may contact. Empty means any host.
    pub allowed_hosts: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allowed_hosts: Vec::new(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, OPTIONS".to_string(),
            allow_headers: "Content-Type".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub max_connections: usize,
    /// How long a client connection may sit without sending a full request.
    pub idle_timeout_ms: u64,
    pub status_policy: StatusPolicy,
    pub upstream: UpstreamConfig,
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_connections: 256,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            status_policy: StatusPolicy::default(),
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var("RELAY_CONFIG") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {}", path))?;
                Self::from_yaml_str(&text)
                    .with_context(|| format!("invalid config file {}", path))?
            }
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.listen_addr = listen_addr;
        }

        if let Ok(timeout) = std::env::var("UPSTREAM_TIMEOUT_MS") {
            cfg.upstream.timeout_ms = timeout
                .parse()
                .with_context(|| format!("UPSTREAM_TIMEOUT_MS is not a number: {}", timeout))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses YAML text; missing fields keep their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text).context("failed to parse YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_socket_addr()?;

        if self.max_connections == 0 {
            anyhow::bail!("max_connections must be greater than zero");
        }
        if self.idle_timeout_ms == 0 {
            anyhow::bail!("idle_timeout_ms must be greater than zero");
        }
        if self.upstream.timeout_ms == 0 {
            anyhow::bail!("upstream.timeout_ms must be greater than zero");
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", self.listen_addr))
    }
}
