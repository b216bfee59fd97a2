//! Observability subsystem.
//!
//! Structured `tracing` events everywhere; every request carries its
//! `X-Request-Id` into log fields and onto the upstream call.

pub mod logging;

pub use logging::init_logging;
