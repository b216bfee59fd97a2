//! Request body transport.
//!
//! # Responsibilities
//! - Choose one transport mode per request
//! - Buffer and re-serialize JSON bodies
//! - Stream multipart bodies upstream without buffering
//! - Issue the upstream HTTP call
//!
//! # Data Flow
//! ```text
//! GET/HEAD/OPTIONS, upgrades  → Empty      → no body read
//! multipart/form-data         → Multipart  → inbound stream → reqwest::Body::wrap_stream
//! POST/PUT/PATCH/DELETE       → Json       → to_bytes → serde_json → Vec<u8>
//! ```
//!
//! # Design Decisions
//! - Body problems fail before any network call
//! - Multipart keeps `Content-Type` byte-for-byte so the boundary survives
//! - Backpressure comes from the stream: nothing is read ahead of the socket

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use url::Url;

use crate::http::error::ProxyError;

/// How the request body travels upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Empty,
    Json,
    Multipart,
    WebSocket,
}

/// Everything needed to issue the upstream call.
#[derive(Debug)]
pub struct UpstreamTarget {
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: TransportMode,
}

/// Body ready to send upstream.
#[derive(Debug)]
pub enum OutboundBody {
    None,
    Json(Vec<u8>),
    Stream(reqwest::Body),
}

/// `Content-Type` contains `multipart/form-data`.
pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("multipart/form-data"))
        .unwrap_or(false)
}

/// Pick the transport for a request from its effective method and headers.
pub fn select_mode(method: &Method, headers: &HeaderMap, is_websocket: bool) -> TransportMode {
    if is_websocket {
        return TransportMode::WebSocket;
    }
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return TransportMode::Empty;
    }
    if is_multipart(headers) {
        return TransportMode::Multipart;
    }
    if matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE) {
        return TransportMode::Json;
    }
    TransportMode::Empty
}

/// Turn the inbound body into an outbound one, adding the body headers
/// (`Content-Type`, `Content-Length`) to `outbound`.
pub async fn prepare_body(
    mode: TransportMode,
    body: Body,
    inbound: &HeaderMap,
    outbound: &mut HeaderMap,
    max_json_bytes: usize,
) -> Result<OutboundBody, ProxyError> {
    match mode {
        TransportMode::Empty | TransportMode::WebSocket => Ok(OutboundBody::None),
        TransportMode::Json => {
            let bytes = axum::body::to_bytes(body, max_json_bytes)
                .await
                .map_err(ProxyError::BodyRead)?;
            if bytes.is_empty() {
                return Ok(OutboundBody::None);
            }
            let value: serde_json::Value = serde_json::from_slice(&bytes)?;
            let encoded = serde_json::to_vec(&value)?;
            outbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Ok(OutboundBody::Json(encoded))
        }
        TransportMode::Multipart => {
            for name in [header::CONTENT_TYPE, header::CONTENT_LENGTH] {
                if let Some(value) = inbound.get(&name) {
                    outbound.insert(name, value.clone());
                }
            }
            Ok(OutboundBody::Stream(reqwest::Body::wrap_stream(
                body.into_data_stream(),
            )))
        }
    }
}

/// Send the upstream request.
pub async fn send(
    client: &reqwest::Client,
    method: &Method,
    target: UpstreamTarget,
    body: OutboundBody,
) -> Result<reqwest::Response, ProxyError> {
    let url_string = target.url.to_string();
    tracing::debug!(
        method = %method,
        url = %url_string,
        mode = ?target.mode,
        "Forwarding upstream"
    );

    let builder = client
        .request(method.clone(), target.url)
        .headers(target.headers);

    let builder = match body {
        OutboundBody::None => builder,
        OutboundBody::Json(bytes) => builder.body(bytes),
        OutboundBody::Stream(stream) => builder.body(stream),
    };

    builder.send().await.map_err(|source| ProxyError::Upstream {
        url: url_string,
        source,
    })
}
