//! CORS relay
//!
//! Forwards `GET /?url=<target>` to the target, returns its bytes verbatim,
//! and answers preflight requests locally.

pub mod cors;
pub mod error;
pub mod handler;
pub mod upstream;

pub use cors::Cors;
pub use error::RelayError;
pub use handler::RelayHandler;
pub use upstream::Upstream;
