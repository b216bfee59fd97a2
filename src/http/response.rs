//! Backend response normalization.
//!
//! # Responsibilities
//! - Wrap non-2xx backend bodies in one error shape, keeping the status
//! - Stream file downloads through untouched, with their headers
//! - Return JSON or text success bodies unwrapped
//!
//! # Design Decisions
//! - Binary payloads are never inspected or buffered
//! - Backend failures are not router failures; only body reads can fail here

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::http::error::ProxyError;
use crate::routing::RouteDecision;
use crate::security::headers::strip_hop_by_hop;

fn content_type_of(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn is_json(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

fn status_text(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

/// File-service GET whose body is not JSON.
pub fn is_binary_download(decision: &RouteDecision, content_type: &str) -> bool {
    decision.is_file_request && decision.method == Method::GET && !is_json(content_type)
}

/// Error body for a non-2xx backend response.
///
/// A JSON object gains `status` and `statusText`; anything else becomes
/// `{error: true, message, status, statusText}`.
pub fn error_body(status: StatusCode, content_type: &str, body: &[u8]) -> Value {
    let parsed = if is_json(content_type) {
        serde_json::from_slice::<Value>(body).ok()
    } else {
        None
    };

    match parsed {
        Some(Value::Object(mut object)) => {
            object.insert("status".into(), json!(status.as_u16()));
            object.insert("statusText".into(), json!(status_text(status)));
            Value::Object(object)
        }
        other => {
            let message = other.unwrap_or_else(|| Value::String(String::from_utf8_lossy(body).into_owned()));
            let mut object = Map::new();
            object.insert("error".into(), Value::Bool(true));
            object.insert("message".into(), message);
            object.insert("status".into(), json!(status.as_u16()));
            object.insert("statusText".into(), json!(status_text(status)));
            Value::Object(object)
        }
    }
}

/// Success body: parsed JSON, text, or nothing.
pub fn success_response(status: StatusCode, content_type: &str, body: &[u8]) -> Response {
    if body.is_empty() {
        return status.into_response();
    }

    if is_json(content_type) {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            return (status, Json(value)).into_response();
        }
        tracing::debug!("Backend sent invalid JSON; returning it as text");
    }

    let text = String::from_utf8_lossy(body).into_owned();
    match HeaderValue::from_str(content_type) {
        Ok(ct) if !content_type.is_empty() => (status, [(header::CONTENT_TYPE, ct)], text).into_response(),
        _ => (status, text).into_response(),
    }
}

/// Shape a backend response for the caller.
pub async fn normalize(upstream: reqwest::Response, decision: &RouteDecision) -> Result<Response, ProxyError> {
    let status = upstream.status();
    let content_type = content_type_of(upstream.headers()).to_string();

    if !status.is_success() {
        let body = upstream.bytes().await.map_err(ProxyError::UpstreamBody)?;
        tracing::info!(
            status = status.as_u16(),
            service = %decision.service,
            path = %decision.path,
            "Backend returned an error"
        );
        return Ok((status, Json(error_body(status, &content_type, &body))).into_response());
    }

    if is_binary_download(decision, &content_type) {
        let headers = strip_hop_by_hop(upstream.headers());
        let mut response = Response::builder()
            .status(status)
            .body(Body::from_stream(upstream.bytes_stream()))?;
        *response.headers_mut() = headers;
        return Ok(response);
    }

    let body = upstream.bytes().await.map_err(ProxyError::UpstreamBody)?;
    Ok(success_response(status, &content_type, &body))
}
