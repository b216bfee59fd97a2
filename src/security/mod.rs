//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (CORS headers, OPTIONS short-circuit)
//!     → credentials.rs (normalize/forward bearer token, advisory inspection)
//!     → headers.rs (allow-listed passthrough, hop-by-hop stripping)
//!     → Pass to body transport
//! ```
//!
//! # Design Decisions
//! - The router forwards credentials; it never authorizes
//! - Token inspection is advisory and fail-open
//! - No trust in client input: only allow-listed headers travel upstream

pub mod cors;
pub mod credentials;
pub mod headers;
