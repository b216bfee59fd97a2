//! Proxy-level failures and their wire shape.
//!
//! Any failure of the router itself (not of a backend) surfaces to the
//! caller as `{"error": "Proxy Error", "message": ...}` with status 500.
//! Outside production the source chain is added as `stack`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::routing::ResolveError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to build upstream URL: {0}")]
    Resolve(#[from] ResolveError),

    #[error("failed to read request body: {0}")]
    BodyRead(#[source] axum::Error),

    #[error("request body is not valid JSON: {0}")]
    BodyJson(#[from] serde_json::Error),

    #[error("upstream request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read upstream response: {0}")]
    UpstreamBody(#[source] reqwest::Error),

    #[error("websocket upgrade to {url} failed: {reason}")]
    WebSocket { url: String, reason: String },

    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ProxyError {
    /// Status reported to the caller for a router failure.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Error text followed by every underlying source.
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        chain
    }

    /// Render the structured error body.
    pub fn into_response_with(self, expose_details: bool) -> Response {
        let mut body = json!({
            "error": "Proxy Error",
            "message": self.to_string(),
        });
        if expose_details {
            body["stack"] = json!(self.chain());
        }
        (self.status(), Json(body)).into_response()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}
