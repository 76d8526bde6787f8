//! Public facade crate for `searchagent`.
//!
//! No IO and no provider code lives here. It re-exports the gateway trait,
//! payload types and the orchestrator from `searchagent-core`, so callers can
//! plug in their own [`ModelGateway`] without depending on the internal layout.

pub use searchagent_core::*;
