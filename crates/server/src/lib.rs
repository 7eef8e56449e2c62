//! manhwadex HTTP server library.
//!
//! Exposed as a library so integration tests can build the router with
//! mock collaborators injected.

pub mod api;
pub mod metrics;
pub mod state;
