//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Forward the upgrade handshake to the resolved backend
//! - Return the backend's `101 Switching Protocols` to the client
//! - Join both upgraded connections with a [`DuplexPipe`]
//!
//! # Data Flow
//! ```text
//! Client ──handshake──▶ Router ──handshake──▶ Backend
//! Client ◀────101───── Router ◀────101───── Backend
//! Client ◀══ bytes ══▶ DuplexPipe ◀══ bytes ══▶ Backend
//! ```
//!
//! # Design Decisions
//! - Transport-level relay: frames are copied as bytes, never parsed
//! - The backend computes `Sec-WebSocket-Accept` from the client's own key,
//!   so extensions and subprotocols are negotiated end to end
//! - When either peer closes or fails, both connections are dropped
//! - A backend that refuses the upgrade is reported like any backend error

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::Response;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::http::error::ProxyError;
use crate::http::response;
use crate::http::server::AppState;
use crate::routing::resolver::websocket_url;
use crate::routing::{QueryParams, RouteDecision};
use crate::security::credentials::websocket_authorization;
use crate::security::headers::{handshake_headers, strip_hop_by_hop};

/// Which side ended a relay first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedBy {
    Client,
    Upstream,
}

/// Totals for a finished relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub closed_by: ClosedBy,
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
}

/// Read buffer per relay direction.
const RELAY_BUFFER: usize = 8 * 1024;

/// Bidirectional byte pipe between two connections.
///
/// Each direction pumps split halves with `write_all`, so a slow reader
/// applies backpressure to the opposite writer. The pipe ends as soon as
/// either direction finishes, dropping both connections. Byte totals count
/// what was delivered, including on the direction that was cut short.
pub struct DuplexPipe<C, U> {
    client: C,
    upstream: U,
}

impl<C, U> DuplexPipe<C, U>
where
    C: AsyncRead + AsyncWrite + Send,
    U: AsyncRead + AsyncWrite + Send,
{
    pub fn new(client: C, upstream: U) -> Self {
        Self { client, upstream }
    }

    /// Relay until one side closes or errors.
    pub async fn run(self) -> std::io::Result<RelayStats> {
        let (mut client_rx, mut client_tx) = tokio::io::split(self.client);
        let (mut upstream_rx, mut upstream_tx) = tokio::io::split(self.upstream);

        let mut sent = 0u64;
        let mut received = 0u64;

        let closed_by = tokio::select! {
            result = pump(&mut client_rx, &mut upstream_tx, &mut sent) => {
                result?;
                ClosedBy::Client
            }
            result = pump(&mut upstream_rx, &mut client_tx, &mut received) => {
                result?;
                ClosedBy::Upstream
            }
        };

        let _ = upstream_tx.shutdown().await;
        let _ = client_tx.shutdown().await;

        Ok(RelayStats {
            closed_by,
            client_to_upstream: sent,
            upstream_to_client: received,
        })
    }
}

/// Copy `reader` into `writer` until EOF, adding each delivered chunk to
/// `total` as it goes.
async fn pump<R, W>(reader: &mut R, writer: &mut W, total: &mut u64) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *total += n as u64;
    }
}

/// The HTTP/1.1 URL carrying a WebSocket handshake (`ws→http`, `wss→https`).
pub fn handshake_url(target: &Url) -> Url {
    let scheme = match target.scheme() {
        "ws" => "http",
        "wss" => "https",
        _ => return target.clone(),
    };
    let mut url = target.clone();
    if url.set_scheme(scheme).is_err() {
        return target.clone();
    }
    url
}

/// Proxy a WebSocket upgrade request.
pub async fn proxy_upgrade(
    state: &AppState,
    mut request: Request,
    decision: &RouteDecision,
    query: &QueryParams,
) -> Result<Response, ProxyError> {
    let target = websocket_url(&state.resolver.resolve(decision, query)?);

    let mut headers = handshake_headers(request.headers());
    if let Some(auth) = websocket_authorization(request.headers(), query) {
        headers.insert(header::AUTHORIZATION, auth);
    }

    let on_client_upgrade = hyper::upgrade::on(&mut request);
    drop(request);

    tracing::info!(upstream = %target, service = %decision.service, "Opening WebSocket relay");

    let upstream = state
        .ws_client
        .get(handshake_url(&target))
        .headers(headers)
        .send()
        .await
        .map_err(|e| ProxyError::WebSocket {
            url: target.to_string(),
            reason: e.to_string(),
        })?;

    if upstream.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::warn!(upstream = %target, status = %upstream.status(), "Backend refused WebSocket upgrade");
        return response::normalize(upstream, decision).await;
    }

    let mut switching = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .body(Body::empty())?;
    let mut upgrade_headers = strip_hop_by_hop(upstream.headers());
    for name in [header::CONNECTION, header::UPGRADE] {
        if let Some(value) = upstream.headers().get(&name) {
            upgrade_headers.insert(name, value.clone());
        }
    }
    *switching.headers_mut() = upgrade_headers;

    let relay_target = target.to_string();
    tokio::spawn(async move {
        let upstream_io = match upstream.upgrade().await {
            Ok(io) => io,
            Err(e) => {
                tracing::error!(upstream = %relay_target, error = %e, "Backend upgrade failed");
                return;
            }
        };
        let client_io = match on_client_upgrade.await {
            Ok(io) => TokioIo::new(io),
            Err(e) => {
                tracing::error!(upstream = %relay_target, error = %e, "Client upgrade failed");
                return;
            }
        };

        match DuplexPipe::new(client_io, upstream_io).run().await {
            Ok(stats) => tracing::info!(
                upstream = %relay_target,
                closed_by = ?stats.closed_by,
                client_to_upstream = stats.client_to_upstream,
                upstream_to_client = stats.upstream_to_client,
                "WebSocket relay closed"
            ),
            Err(e) => tracing::warn!(upstream = %relay_target, error = %e, "WebSocket relay ended with error"),
        }
    });

    Ok(switching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn handshake_scheme_mapping() {
        let ws = Url::parse("ws://groups.test/messages/ws?room=1").unwrap();
        assert_eq!(handshake_url(&ws).as_str(), "http://groups.test/messages/ws?room=1");
        let wss = Url::parse("wss://presence.test/presence/ws").unwrap();
        assert_eq!(handshake_url(&wss).as_str(), "https://presence.test/presence/ws");
    }

    #[tokio::test]
    async fn pipe_relays_both_directions_until_close() {
        let (client_side, mut client) = duplex(64);
        let (upstream_side, mut upstream) = duplex(64);

        let relay = tokio::spawn(DuplexPipe::new(client_side, upstream_side).run());

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        upstream.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(upstream);
        let stats = relay.await.unwrap().unwrap();
        assert_eq!(stats.closed_by, ClosedBy::Upstream);
        assert_eq!(stats.upstream_to_client, 5);
        assert_eq!(stats.client_to_upstream, 4);

        // The client sees EOF once the upstream is gone.
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
