//! End-to-end routing through a live router and mock backends.

mod common;

use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use common::{echo_backend, echo_services, spawn_backend, spawn_router};

async fn get_json(client: &reqwest::Client, url: String) -> Value {
    client.get(url).send().await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn services_receive_their_paths() {
    let router = spawn_router(echo_services().await).await;
    let client = reqwest::Client::new();

    let seen = get_json(&client, router.url("/api/proxy/message/42")).await;
    assert_eq!(seen["service"], "group");
    assert_eq!(seen["path"], "/messages/42");

    let seen = get_json(&client, router.url("/notifications?unread=true")).await;
    assert_eq!(seen["service"], "notification");
    assert_eq!(seen["path"], "/notifications");
    assert_eq!(seen["query"], "unread=true");

    let seen = get_json(&client, router.url("/proxy/files/abc/download")).await;
    assert_eq!(seen["service"], "file");
    assert_eq!(seen["path"], "/api/files/abc/download");

    let seen = get_json(&client, router.url("/api/proxy/users/me")).await;
    assert_eq!(seen["service"], "general");
    assert_eq!(seen["path"], "/users/me");
}

#[tokio::test]
async fn presence_ids_keep_literal_commas() {
    let router = spawn_router(echo_services().await).await;
    let seen = get_json(
        &reqwest::Client::new(),
        router.url("/presence/users?user_ids=1,2,3"),
    )
    .await;
    assert_eq!(seen["service"], "presence");
    assert_eq!(seen["query"], "user_ids=1,2,3");
}

#[tokio::test]
async fn json_body_and_credentials_are_forwarded() {
    let router = spawn_router(echo_services().await).await;
    let response = reqwest::Client::new()
        .post(router.url("/api/proxy/messages"))
        .header(header::COOKIE, "auth_token=tok-1")
        .header("x-request-id", "req-42")
        .json(&json!({"text": "hi"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let seen: Value = response.json().await.unwrap();
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["authorization"], "Bearer tok-1");
    assert_eq!(seen["content_type"], "application/json");
    assert_eq!(seen["request_id"], "req-42");
    assert_eq!(seen["cookie"], Value::Null);
    assert_eq!(serde_json::from_str::<Value>(seen["body"].as_str().unwrap()).unwrap(), json!({"text": "hi"}));
}

#[tokio::test]
async fn login_ignores_cookie_token() {
    let router = spawn_router(echo_services().await).await;
    let seen: Value = reqwest::Client::new()
        .post(router.url("/api/proxy/auth/login"))
        .header(header::COOKIE, "auth_token=stale")
        .json(&json!({"email": "a@b.c", "password": "x"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(seen["service"], "general");
    assert_eq!(seen["authorization"], Value::Null);
}

#[tokio::test]
async fn friends_add_is_sent_as_post() {
    let router = spawn_router(echo_services().await).await;
    let seen = get_json(&reqwest::Client::new(), router.url("/users/7/friends/add")).await;
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["body"], "");
}

#[tokio::test]
async fn multipart_body_streams_with_boundary() {
    let router = spawn_router(echo_services().await).await;
    let boundary = "----router-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello file\r\n--{b}--\r\n",
        b = boundary
    );
    let content_type = format!("multipart/form-data; boundary={}", boundary);

    let seen: Value = reqwest::Client::new()
        .post(router.url("/api/proxy/files/upload"))
        .header(header::CONTENT_TYPE, content_type.as_str())
        .body(body.clone())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(seen["service"], "file");
    assert_eq!(seen["path"], "/api/files/upload");
    assert_eq!(seen["content_type"], content_type.as_str());
    assert_eq!(seen["body"], body.as_str());
}

#[tokio::test]
async fn backend_errors_are_normalized() {
    let failing = Router::new()
        .route(
            "/users/missing",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))) }),
        )
        .route(
            "/users/broken",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
    let mut config = echo_services().await;
    config.services.general = format!("http://{}", spawn_backend(failing).await);
    let router = spawn_router(config).await;
    let client = reqwest::Client::new();

    let response = client.get(router.url("/users/missing")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "not found", "status": 404, "statusText": "Not Found"}));

    let response = client.get(router.url("/users/broken")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": true, "message": "upstream down", "status": 502, "statusText": "Bad Gateway"})
    );
}

#[tokio::test]
async fn binary_downloads_pass_through() {
    let png: &'static [u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 1, 2, 3];
    let files = Router::new()
        .route(
            "/api/files/logo.png",
            get(move || async move {
                (
                    [
                        (header::CONTENT_TYPE, "image/png"),
                        (header::CONTENT_DISPOSITION, "attachment; filename=\"logo.png\""),
                    ],
                    png,
                )
            }),
        )
        .fallback_service(echo_backend("file"));
    let mut config = echo_services().await;
    config.services.file = format!("http://{}", spawn_backend(files).await);
    let router = spawn_router(config).await;

    let response = reqwest::Client::new()
        .get(router.url("/api/proxy/files/logo.png"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"logo.png\""
    );
    assert_eq!(&response.bytes().await.unwrap()[..], png);
}

#[tokio::test]
async fn preflight_is_answered_locally() {
    let router = spawn_router(echo_services().await).await;
    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, router.url("/api/proxy/anything/at/all"))
        .header(header::ORIGIN, "http://app.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_backend_reports_proxy_error() {
    let mut config = echo_services().await;
    config.services.notification = "http://127.0.0.1:9".into();
    let router = spawn_router(config).await;

    let response = reqwest::Client::new()
        .get(router.url("/notifications"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Proxy Error");
    assert!(body["message"].as_str().unwrap().contains("127.0.0.1:9"));
}

/// Send a request line verbatim, bypassing client-side URL normalization.
async fn raw_get(addr: std::net::SocketAddr, target: &str) -> Value {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut socket = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        target, addr
    );
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    socket.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.1 200"), "{}", head);
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn backslashes_and_dot_segments_are_canonical_on_the_wire() {
    let router = spawn_router(echo_services().await).await;

    let seen = raw_get(router.addr, "/api/proxy/users\\\\me").await;
    assert_eq!(seen["service"], "general");
    assert_eq!(seen["path"], "/users/me");

    let seen = raw_get(router.addr, "/files/../../admin/keys").await;
    assert_eq!(seen["service"], "general");
    assert_eq!(seen["path"], "/admin/keys");

    let seen = raw_get(router.addr, "/api/proxy/files/a/%2e%2e/b.png").await;
    assert_eq!(seen["service"], "file");
    assert_eq!(seen["path"], "/api/files/b.png");
}
