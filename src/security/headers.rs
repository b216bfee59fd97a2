//! Header manipulation.
//!
//! # Responsibilities
//! - Pick the inbound headers that travel upstream on plain HTTP calls
//! - Pick the handshake headers that travel upstream on WebSocket upgrades
//! - Strip hop-by-hop headers from streamed backend responses
//!
//! # Design Decisions
//! - Allow-list upstream headers; the router rebuilds `Authorization`
//!   and `Content-Type` itself
//! - `Host` is always derived from the upstream URL by the client

use axum::http::{header, HeaderMap, HeaderName};

use crate::http::X_REQUEST_ID;

/// Inbound headers copied verbatim onto every upstream HTTP request.
const PASSTHROUGH: [HeaderName; 3] = [header::ACCEPT, header::ACCEPT_LANGUAGE, header::USER_AGENT];

/// Inbound headers copied onto an upstream WebSocket handshake.
const HANDSHAKE: [HeaderName; 8] = [
    header::CONNECTION,
    header::UPGRADE,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
    header::SEC_WEBSOCKET_PROTOCOL,
    header::ORIGIN,
    header::USER_AGENT,
];

/// Connection-scoped headers that must not be relayed.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
];

fn copy_named(from: &HeaderMap, to: &mut HeaderMap, names: &[HeaderName]) {
    for name in names {
        for value in from.get_all(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

/// Headers forwarded on every plain HTTP upstream request.
pub fn passthrough_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    copy_named(inbound, &mut out, &PASSTHROUGH);
    copy_named(inbound, &mut out, &[X_REQUEST_ID]);
    out
}

/// Headers forwarded on a WebSocket upgrade handshake.
pub fn handshake_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    copy_named(inbound, &mut out, &HANDSHAKE);
    copy_named(inbound, &mut out, &[X_REQUEST_ID]);
    out
}

/// Copy of `headers` without hop-by-hop entries (including `Keep-Alive`).
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    out.remove("keep-alive");
    out
}
