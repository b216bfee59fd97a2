//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → server.rs (Axum setup, CORS, request ID, classification)
//!     → transport.rs (body mode, upstream call)     or websocket.rs (upgrade relay)
//!     → response.rs (error wrapping, binary streaming)
//!     → Send to client
//! ```

pub mod error;
pub mod request;
pub mod response;
pub mod server;
pub mod transport;
pub mod websocket;

pub use error::ProxyError;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
