//! Service router.
//!
//! A single HTTP entry point that fans client traffic out to five backend
//! services (general, group, notification, file, presence).
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ routing::classifier ──▶ routing::resolver
//!                    │                                        │
//!                    │                                        ▼
//!                    │            security::credentials ──▶ http::transport ──▶ Backend
//!                    │                                                            │
//!     Client ◀── http::response ◀─────────────────────────────────────────────────┘
//!
//!     WebSocket upgrades: http::websocket relays bytes between both peers.
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::RouterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
