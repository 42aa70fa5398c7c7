//! Pylon - single-threaded static file server
//!
//! Core library: request line parsing, the per-connection state machine and
//! the readiness-driven event loop.

pub mod config;
pub mod http;
pub mod server;
pub mod transport;
