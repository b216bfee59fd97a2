//! Credential forwarding.
//!
//! # Responsibilities
//! - Normalize an inbound `Authorization` header to `Bearer <token>`
//! - Fall back to the `auth_token` cookie (never for login/registration)
//! - WebSocket fallback to a `token` query parameter
//! - Advisory JWT-shape and expiry inspection
//!
//! # Design Decisions
//! - The router never rejects a request over its token; backends decide
//! - Inspection results are logged only

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap, HeaderValue};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::routing::QueryParams;

/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// Query parameter carrying a token on WebSocket handshakes.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// JWT segments are base64url, with or without padding.
const JWT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Result of the advisory token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// Three decodable segments; `exp` in the future or absent.
    Valid { expires_at: Option<u64> },
    /// `exp` is in the past.
    Expired { expired_at: u64 },
    /// Not a decodable header.payload.signature token.
    Malformed(&'static str),
}

/// Authorization header to send upstream for a plain HTTP request.
///
/// Login and registration requests forward an explicit header untouched by
/// inspection and never fall back to the cookie.
pub fn outbound_authorization(headers: &HeaderMap, is_auth_endpoint: bool) -> Option<HeaderValue> {
    if let Some(value) = inbound_authorization(headers) {
        if is_auth_endpoint {
            return header_value(&with_bearer_prefix(&value), "header");
        }
        return bearer_header(&value, "header");
    }

    if is_auth_endpoint {
        return None;
    }

    cookie_value(headers, AUTH_COOKIE).and_then(|token| bearer_header(&token, "cookie"))
}

/// Authorization header to send with a WebSocket handshake: the inbound
/// header, else the `token` query parameter, else the `auth_token` cookie.
pub fn websocket_authorization(headers: &HeaderMap, query: &QueryParams) -> Option<HeaderValue> {
    if let Some(value) = inbound_authorization(headers) {
        return bearer_header(&value, "header");
    }

    let from_query = query
        .get(TOKEN_QUERY_PARAM)
        .and_then(|v| v.values().first().map(|s| s.to_string()))
        .filter(|t| !t.is_empty());
    if let Some(token) = from_query {
        return bearer_header(&token, "query");
    }

    cookie_value(headers, AUTH_COOKIE).and_then(|token| bearer_header(&token, "cookie"))
}

fn inbound_authorization(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?;
    match value.to_str() {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Ok(_) => None,
        Err(_) => {
            tracing::warn!("Ignoring non-ASCII Authorization header");
            None
        }
    }
}

fn bearer_header(raw: &str, source: &'static str) -> Option<HeaderValue> {
    let value = with_bearer_prefix(raw);
    log_token_status(strip_bearer(&value), source);
    header_value(&value, source)
}

fn header_value(value: &str, source: &'static str) -> Option<HeaderValue> {
    match HeaderValue::from_str(value) {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(source, "Token is not a valid header value; not forwarding");
            None
        }
    }
}

/// Add `Bearer ` unless it is already there.
pub fn with_bearer_prefix(raw: &str) -> String {
    let raw = raw.trim();
    if has_bearer_prefix(raw) {
        raw.to_string()
    } else {
        format!("Bearer {}", raw)
    }
}

fn has_bearer_prefix(value: &str) -> bool {
    value.len() > 7
        && value
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "))
}

fn strip_bearer(value: &str) -> &str {
    if has_bearer_prefix(value) {
        value[7..].trim_start()
    } else {
        value
    }
}

/// Value of a cookie from every `Cookie` header on the request.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// Structural and expiry check of a JWT-shaped token.
pub fn inspect_token(token: &str, now: u64) -> TokenStatus {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return TokenStatus::Malformed("expected three dot-separated segments");
    }

    let payload = match JWT_SEGMENT.decode(segments[1]) {
        Ok(bytes) => bytes,
        Err(_) => return TokenStatus::Malformed("payload is not base64url"),
    };

    let claims: serde_json::Value = match serde_json::from_slice(&payload) {
        Ok(v) => v,
        Err(_) => return TokenStatus::Malformed("payload is not JSON"),
    };

    let exp = match claims.get("exp") {
        None => return TokenStatus::Valid { expires_at: None },
        Some(exp) => match exp.as_u64().or_else(|| exp.as_f64().map(|f| f as u64)) {
            Some(exp) => exp,
            None => return TokenStatus::Malformed("exp claim is not a timestamp"),
        },
    };

    if exp <= now {
        TokenStatus::Expired { expired_at: exp }
    } else {
        TokenStatus::Valid {
            expires_at: Some(exp),
        }
    }
}

fn log_token_status(token: &str, source: &'static str) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    match inspect_token(token, now) {
        TokenStatus::Valid { expires_at } => {
            tracing::debug!(source, ?expires_at, "Forwarding bearer token");
        }
        TokenStatus::Expired { expired_at } => {
            tracing::warn!(source, expired_at, "Forwarding expired token");
        }
        TokenStatus::Malformed(reason) => {
            tracing::warn!(source, reason, "Forwarding token that failed inspection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn jwt(claims: &str) -> String {
        let header = JWT_SEGMENT.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = JWT_SEGMENT.encode(claims);
        format!("{}.{}.c2lnbmF0dXJl", header, payload)
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn header_gains_bearer_prefix() {
        let h = headers(&[(header::AUTHORIZATION, "abc.def.ghi")]);
        assert_eq!(outbound_authorization(&h, false).unwrap(), "Bearer abc.def.ghi");
    }

    #[test]
    fn existing_bearer_is_unchanged() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer xyz")]);
        assert_eq!(outbound_authorization(&h, false).unwrap(), "Bearer xyz");
    }

    /// Counts every event reaching the subscriber.
    struct EventCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for EventCounter {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn events_during(f: impl FnOnce()) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(EventCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, f);
        count.load(Ordering::SeqCst)
    }

    #[test]
    fn auth_endpoints_skip_token_inspection() {
        let h = headers(&[(header::AUTHORIZATION, "opaque-token")]);

        let on_login = events_during(|| {
            assert_eq!(outbound_authorization(&h, true).unwrap(), "Bearer opaque-token");
        });
        assert_eq!(on_login, 0);

        let elsewhere = events_during(|| {
            assert_eq!(outbound_authorization(&h, false).unwrap(), "Bearer opaque-token");
        });
        assert_eq!(elsewhere, 1);
    }

    #[test]
    fn header_is_forwarded_even_for_auth_endpoints() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer xyz")]);
        assert_eq!(outbound_authorization(&h, true).unwrap(), "Bearer xyz");
    }

    #[test]
    fn cookie_fallback() {
        let h = headers(&[(header::COOKIE, "theme=dark; auth_token=tok123")]);
        assert_eq!(outbound_authorization(&h, false).unwrap(), "Bearer tok123");
    }

    #[test]
    fn auth_endpoint_ignores_cookie() {
        let h = headers(&[(header::COOKIE, "auth_token=tok123")]);
        assert!(outbound_authorization(&h, true).is_none());
    }

    #[test]
    fn nothing_to_forward() {
        assert!(outbound_authorization(&HeaderMap::new(), false).is_none());
    }

    #[test]
    fn websocket_prefers_header_then_query_then_cookie() {
        let query = QueryParams::parse(Some("token=from-query"));
        let with_cookie = headers(&[(header::COOKIE, "auth_token=from-cookie")]);

        assert_eq!(
            websocket_authorization(&with_cookie, &query).unwrap(),
            "Bearer from-query"
        );
        assert_eq!(
            websocket_authorization(&with_cookie, &QueryParams::default()).unwrap(),
            "Bearer from-cookie"
        );

        let with_header = headers(&[(header::AUTHORIZATION, "hdr")]);
        assert_eq!(websocket_authorization(&with_header, &query).unwrap(), "Bearer hdr");
    }

    #[test]
    fn cookie_parsing_across_headers() {
        let h = headers(&[
            (header::COOKIE, "a=1"),
            (header::COOKIE, "b=2; auth_token=\"quoted\""),
        ]);
        assert_eq!(cookie_value(&h, "auth_token").as_deref(), Some("quoted"));
        assert_eq!(cookie_value(&h, "missing"), None);
    }

    #[test]
    fn inspect_valid_and_expired() {
        let token = jwt(r#"{"sub":"u1","exp":2000}"#);
        assert_eq!(
            inspect_token(&token, 1000),
            TokenStatus::Valid {
                expires_at: Some(2000)
            }
        );
        assert_eq!(
            inspect_token(&token, 3000),
            TokenStatus::Expired { expired_at: 2000 }
        );
        assert_eq!(
            inspect_token(&jwt(r#"{"sub":"u1"}"#), 1000),
            TokenStatus::Valid { expires_at: None }
        );
    }

    #[test]
    fn inspect_malformed() {
        assert!(matches!(inspect_token("abc.def", 0), TokenStatus::Malformed(_)));
        assert!(matches!(inspect_token("abc.!!!.ghi", 0), TokenStatus::Malformed(_)));
        let not_json = format!("a.{}.c", JWT_SEGMENT.encode("plain"));
        assert!(matches!(inspect_token(&not_json, 0), TokenStatus::Malformed(_)));
    }

    #[test]
    fn expired_token_is_still_forwarded() {
        let token = jwt(r#"{"exp":1}"#);
        let h = headers(&[(header::AUTHORIZATION, token.as_str())]);
        assert_eq!(
            outbound_authorization(&h, false).unwrap(),
            format!("Bearer {}", token).as_str()
        );
    }
}
