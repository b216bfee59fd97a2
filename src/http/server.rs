//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the Axum router with a catch-all proxy handler
//! - Wire up middleware (CORS, tracing, request ID)
//! - Classify each request and hand it to the HTTP or WebSocket path
//! - Shut down gracefully on signal

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::RouterConfig;
use crate::http::error::ProxyError;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response;
use crate::http::transport::{self, UpstreamTarget};
use crate::http::websocket;
use crate::routing::{Classifier, QueryParams, RouteDecision, Resolver};
use crate::security::cors::cors_layer;
use crate::security::credentials::outbound_authorization;
use crate::security::headers::passthrough_headers;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<Classifier>,
    pub resolver: Arc<Resolver>,
    /// Pooled client for plain HTTP forwarding.
    pub client: reqwest::Client,
    /// HTTP/1.1-only client; upgrades need an HTTP/1.1 connection.
    pub ws_client: reqwest::Client,
    pub config: Arc<RouterConfig>,
}

impl AppState {
    pub fn new(config: RouterConfig) -> Result<Self, reqwest::Error> {
        let connect = Duration::from_secs(config.timeouts.connect_secs);
        let idle = Duration::from_secs(config.timeouts.pool_idle_secs);

        let client = reqwest::Client::builder()
            .connect_timeout(connect)
            .pool_idle_timeout(idle)
            .build()?;
        let ws_client = reqwest::Client::builder()
            .connect_timeout(connect)
            .http1_only()
            .build()?;

        Ok(Self {
            classifier: Arc::new(Classifier::new()),
            resolver: Arc::new(Resolver::new(&config.services)),
            client,
            ws_client,
            config: Arc::new(config),
        })
    }
}

/// HTTP server for the service router.
pub struct HttpServer {
    router: Router,
    config: Arc<RouterConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RouterConfig) -> Result<Self, reqwest::Error> {
        let state = AppState::new(config)?;
        let config = state.config.clone();
        let router = build_router(state);
        Ok(Self { router, config })
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.environment,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);
    Router::new()
        .route("/{*path}", any(proxy_handler))
        .route("/", any(proxy_handler))
        .with_state(state)
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
        .layer(cors)
}

/// Catch-all handler: classify, then forward.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let request_id = request.headers().request_id().to_string();

    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    let query = QueryParams::parse(request.uri().query());
    let decision = state
        .classifier
        .classify(request.method(), request.uri().path(), request.headers());

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        service = %decision.service,
        upstream_method = %decision.method,
        websocket = decision.is_websocket,
        "Routing request"
    );

    let result = if decision.is_websocket {
        websocket::proxy_upgrade(&state, request, &decision, &query).await
    } else {
        forward(&state, request, &decision, &query).await
    };

    match result {
        Ok(response) => {
            tracing::info!(
                request_id = %request_id,
                service = %decision.service,
                status = response.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request proxied"
            );
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                service = %decision.service,
                path = %decision.path,
                error = %e,
                "Proxy error"
            );
            e.into_response_with(state.config.expose_error_details())
        }
    }
}

/// Forward a plain HTTP request and normalize the backend's answer.
async fn forward(
    state: &AppState,
    request: Request,
    decision: &RouteDecision,
    query: &QueryParams,
) -> Result<Response, ProxyError> {
    let url = state.resolver.resolve(decision, query)?;
    let (parts, body) = request.into_parts();

    let mut headers = passthrough_headers(&parts.headers);
    if let Some(auth) = outbound_authorization(&parts.headers, decision.is_auth_endpoint) {
        headers.insert(header::AUTHORIZATION, auth);
    }

    let mode = transport::select_mode(&decision.method, &parts.headers, false);
    let outbound = transport::prepare_body(
        mode,
        body,
        &parts.headers,
        &mut headers,
        state.config.limits.max_json_body_bytes,
    )
    .await?;

    let upstream = transport::send(
        &state.client,
        &decision.method,
        UpstreamTarget { url, headers, mode },
        outbound,
    )
    .await?;

    response::normalize(upstream, decision).await
}
