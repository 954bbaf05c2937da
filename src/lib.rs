//! cors-relay - local CORS relay
//!
//! Forwards browser GET requests to the URL named in the `url` query
//! parameter and returns the upstream bytes with permissive CORS headers.

pub mod config;
pub mod http;
pub mod relay;
pub mod server;
