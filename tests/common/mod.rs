//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use service_router::config::RouterConfig;
use service_router::{HttpServer, Shutdown};

/// Serve `app` on an ephemeral loopback port.
pub async fn spawn_backend(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Backend that answers every request with a JSON description of it.
pub fn echo_backend(name: &'static str) -> Router {
    Router::new().fallback(echo).with_state(name)
}

async fn echo(
    State(name): State<&'static str>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let header = |key: &str| {
        headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "service": name,
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "authorization": header("authorization"),
        "content_type": header("content-type"),
        "request_id": header("x-request-id"),
        "cookie": header("cookie"),
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Config pointing every service at its own echo backend.
pub async fn echo_services() -> RouterConfig {
    let mut config = RouterConfig::default();
    config.services.general = format!("http://{}", spawn_backend(echo_backend("general")).await);
    config.services.group = format!("http://{}", spawn_backend(echo_backend("group")).await);
    config.services.notification =
        format!("http://{}", spawn_backend(echo_backend("notification")).await);
    config.services.file = format!("http://{}", spawn_backend(echo_backend("file")).await);
    config.services.presence = format!("http://{}", spawn_backend(echo_backend("presence")).await);
    config
}

/// A running router.
pub struct TestRouter {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRouter {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the router on an ephemeral port.
pub async fn spawn_router(config: RouterConfig) -> TestRouter {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    tokio::spawn(server.run(listener, shutdown.subscribe()));
    TestRouter { addr, shutdown }
}
