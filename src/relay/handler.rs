//! Request dispatch for the relay endpoint.

use crate::config::{Config, StatusPolicy};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::relay::cors::Cors;
use crate::relay::error::RelayError;
use crate::relay::upstream::Upstream;
use anyhow::Result;

/// Turns inbound requests into relay responses.
///
/// Shared read-only between connection tasks.
#[derive(Debug, Clone)]
pub struct RelayHandler {
    upstream: Upstream,
    cors: Cors,
    policy: StatusPolicy,
}

impl RelayHandler {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            upstream: Upstream::new(&config.upstream)?,
            cors: Cors::new(&config.cors),
            policy: config.status_policy,
        })
    }

    pub fn cors(&self) -> &Cors {
        &self.cors
    }

    /// Produces the undecorated response for `request`.
    pub async fn handle(&self, request: &Request) -> Response {
        match request.method {
            Method::OPTIONS => Response::empty(),
            Method::GET => match self.forward(request).await {
                Ok(response) => response,
                Err(err) => err.to_response(self.policy),
            },
            _ => {
                tracing::debug!(method = ?request.method, path = %request.path, "Rejected method");
                RelayError::MethodNotAllowed.to_response(self.policy)
            }
        }
    }

    async fn forward(&self, request: &Request) -> Result<Response, RelayError> {
        let raw = request.query_param("url").ok_or(RelayError::MissingUrl)?;

        let target = self.upstream.parse_target(&raw).inspect_err(|e| {
            tracing::warn!(url = %raw, error = %e, "Rejected relay target");
        })?;

        match self.upstream.fetch(&target).await {
            Ok(body) => {
                tracing::info!(url = %target, bytes = body.len(), "Proxy ok");
                Ok(Response::json_bytes(body.to_vec()))
            }
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "Proxy error");
                Err(e)
            }
        }
    }
}
