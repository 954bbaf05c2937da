//! Cross-origin headers attached to every relay response.

use crate::config::CorsConfig;
use crate::http::response::Response;

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";

#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for Cors {
    fn default() -> Self {
        Self::new(&CorsConfig::default())
    }
}

impl Cors {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allow_origin: config.allow_origin.clone(),
            allow_methods: config.allow_methods.clone(),
            allow_headers: config.allow_headers.clone(),
        }
    }

    /// Sets the CORS header set on `response`, replacing any existing values.
    ///
    /// The connection layer calls this on every response it writes.
    pub fn decorate(&self, mut response: Response) -> Response {
        response
            .headers
            .retain(|k, _| !k.to_ascii_lowercase().starts_with("access-control-"));

        response
            .headers
            .insert(ALLOW_ORIGIN.to_string(), self.allow_origin.clone());
        response
            .headers
            .insert(ALLOW_METHODS.to_string(), self.allow_methods.clone());
        response
            .headers
            .insert(ALLOW_HEADERS.to_string(), self.allow_headers.clone());

        response
    }
}
