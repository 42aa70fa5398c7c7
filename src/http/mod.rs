//! HTTP protocol implementation.
//!
//! Just enough HTTP/1.0 to serve files: one request line in, one status line
//! and optionally a file body out, then the connection closes.
//!
//! # Architecture
//!
//! - **`connection`**: the per-connection state machine driven by the reactor
//! - **`parser`**: extracts the path from a request line
//! - **`request`**: bounded per-connection storage for the requested path
//! - **`resolve`**: maps request paths onto the document root
//! - **`response`**: status codes and their status lines
//! - **`writer`**: resumable transmission of the status line and file body
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← read-readiness: buffer bytes, try to parse
//!        └──────┬───────────┘
//!               │ Request line parsed (or rejected)
//!               ▼
//!        ┌──────────────────┐
//!        │  RequestReady    │ ← status decided, registration switched to write
//!        └──────┬───────────┘
//!               │ First write-readiness
//!               ▼
//!        ┌──────────────────┐
//!        │   Responding     │ ← header, then file body, one attempt per event
//!        └──────┬───────────┘
//!               │ Response sent, peer gone, or I/O error
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │ ← removed from the table and deregistered
//!        └──────────────────┘
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod resolve;
pub mod response;
pub mod writer;
