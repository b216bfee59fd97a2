//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers, query)
//!     → classifier.rs (normalize path, ordered service rule table)
//!     → RouteDecision
//!     → resolver.rs (ordered rewrite table, base URL, query encoding)
//!     → absolute upstream Url
//! ```
//!
//! # Design Decisions
//! - Rule tables compiled at startup, immutable at runtime
//! - No regex in hot path (segment and prefix matching only)
//! - Deterministic: same input always yields the same decision
//! - First match wins; table order is the precedence
//! - Classification is total: unknown paths fall through to the General service

use std::fmt;

use axum::http::Method;
use serde::Serialize;

pub mod classifier;
pub mod matcher;
pub mod query;
pub mod resolver;

pub use classifier::Classifier;
pub use query::{QueryParams, QueryValue};
pub use resolver::{ResolveError, Resolver};

/// Logical backend a request is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    General,
    Group,
    Notification,
    File,
    Presence,
}

impl ServiceId {
    pub const ALL: [ServiceId; 5] = [
        ServiceId::General,
        ServiceId::Group,
        ServiceId::Notification,
        ServiceId::File,
        ServiceId::Presence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::General => "general",
            ServiceId::Group => "group",
            ServiceId::Notification => "notification",
            ServiceId::File => "file",
            ServiceId::Presence => "presence",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    /// Backend that receives the request.
    pub service: ServiceId,
    /// Path with routing-layer prefixes stripped, no leading slash.
    pub path: String,
    /// Method sent upstream; may differ from the inbound method.
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    /// Connection/Upgrade headers ask for a WebSocket.
    pub is_websocket: bool,
    /// Login or registration endpoint.
    pub is_auth_endpoint: bool,
    /// Served by the file/media service.
    pub is_file_request: bool,
}

fn serialize_method<S: serde::Serializer>(method: &Method, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(method.as_str())
}
