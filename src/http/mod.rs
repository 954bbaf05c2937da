//! HTTP/1.1 server side of the relay.
//!
//! # Architecture
//!
//! - **`connection`**: per-client state machine, dispatches to the relay handler
//! - **`parser`**: parses incoming HTTP requests from byte buffers
//! - **`request`**: request representation and query-string access
//! - **`response`**: response representation with builder pattern
//! - **`writer`**: serializes and writes responses to the client
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received (or malformed → 400, close)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Relay handler runs; client EOF aborts it
//!        └──────┬───────────┘
//!               │ Response ready, CORS headers applied
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod request;
pub mod response;
pub mod parser;
pub mod connection;
pub mod writer;
