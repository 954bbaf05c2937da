//! Failures that end a relayed request.

use crate::config::StatusPolicy;
use crate::http::response::{Response, StatusCode};

#[derive(Debug)]
pub enum RelayError {
    /// No usable `url` query parameter.
    MissingUrl,
    /// The `url` value is not an absolute http(s) URL.
    InvalidUrl(String),
    /// The target host is outside the configured allowlist.
    HostNotAllowed(String),
    /// The inbound method is neither GET nor OPTIONS.
    MethodNotAllowed,
    /// The upstream did not answer within the configured timeout.
    Timeout(String),
    /// Any other upstream failure, including non-2xx statuses.
    Upstream(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::MissingUrl => write!(f, "URL parameter is required"),
            RelayError::InvalidUrl(reason) => write!(f, "Invalid url: {}", reason),
            RelayError::HostNotAllowed(host) => write!(f, "Host not allowed: {}", host),
            RelayError::MethodNotAllowed => write!(f, "Method not allowed"),
            RelayError::Timeout(msg) => write!(f, "Upstream timed out: {}", msg),
            RelayError::Upstream(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

impl RelayError {
    /// Status used when the relay reports errors with real HTTP codes.
    pub fn strict_status(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl
            | RelayError::InvalidUrl(_)
            | RelayError::HostNotAllowed(_) => StatusCode::BadRequest,
            RelayError::MethodNotAllowed => StatusCode::MethodNotAllowed,
            RelayError::Timeout(_) => StatusCode::GatewayTimeout,
            RelayError::Upstream(_) => StatusCode::BadGateway,
        }
    }

    /// Outer status under `policy`. Method rejection is 405 either way.
    pub fn status(&self, policy: StatusPolicy) -> StatusCode {
        match (policy, self) {
            (_, RelayError::MethodNotAllowed) => StatusCode::MethodNotAllowed,
            (StatusPolicy::Compat, _) => StatusCode::Ok,
            (StatusPolicy::Strict, err) => err.strict_status(),
        }
    }

    pub fn to_response(&self, policy: StatusPolicy) -> Response {
        Response::json_error(self.status(policy), &self.to_string())
    }
}
