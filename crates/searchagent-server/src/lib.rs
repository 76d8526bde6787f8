//! `searchagent-server` (library surface).
//!
//! The `searchagent` binary is the main entrypoint. The router and configuration
//! live here so tests can drive them in-process with a stub gateway.

pub mod config;
pub mod envelope;
pub mod routes;

pub use routes::{app, AppState};
