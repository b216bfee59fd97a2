//! Request classification.
//!
//! # Responsibilities
//! - Strip routing-layer prefixes (`api/proxy/`, `proxy/`)
//! - Apply forced-method rules
//! - Flag authentication endpoints
//! - Select the backend service from an ordered rule table
//! - Detect WebSocket upgrades and pin their service
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Total: an unrecognized path goes to the General service verbatim
//! - Service selection never reads headers; only WebSocket detection does

use axum::http::{header, HeaderMap, Method};

use crate::routing::matcher::{
    AnyMatcher, ContainsMatcher, ExactPathMatcher, FirstSegmentMatcher, GroupMessagesMatcher,
    Matcher, OrMatcher, RouteInput, SegmentPrefixMatcher, SegmentSuffixMatcher,
};
use crate::routing::{RouteDecision, ServiceId};

/// Prefixes the inbound routing layer may leave on the path.
const ROUTING_PREFIXES: [&str; 2] = ["api/proxy", "proxy"];

/// Paths that log in or register and so never carry an existing token.
const AUTH_ENDPOINTS: &[&str] = &["auth/login", "login", "auth/register", "register"];

/// A table entry mapping a predicate to a service.
#[derive(Debug)]
struct ServiceRule {
    name: &'static str,
    matcher: Box<dyn Matcher>,
    service: ServiceId,
}

impl ServiceRule {
    fn new(name: &'static str, matcher: impl Matcher + 'static, service: ServiceId) -> Self {
        Self {
            name,
            matcher: Box::new(matcher),
            service,
        }
    }
}

/// A table entry forcing the upstream method.
#[derive(Debug)]
struct MethodOverride {
    matcher: Box<dyn Matcher>,
    method: Method,
}

/// Maps inbound requests to a [`RouteDecision`].
#[derive(Debug)]
pub struct Classifier {
    method_overrides: Vec<MethodOverride>,
    auth_endpoints: ExactPathMatcher,
    services: Vec<ServiceRule>,
    websocket_services: Vec<ServiceRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Build the rule tables. Order inside each table is precedence.
    pub fn new() -> Self {
        let method_overrides = vec![MethodOverride {
            matcher: Box::new(SegmentSuffixMatcher::new("friends/add")),
            method: Method::POST,
        }];

        let services = vec![
            ServiceRule::new(
                "messages",
                OrMatcher::new(vec![
                    Box::new(FirstSegmentMatcher::new(&["message", "messages"])),
                    Box::new(ContainsMatcher::new("/message")),
                    Box::new(GroupMessagesMatcher),
                ]),
                ServiceId::Group,
            ),
            ServiceRule::new(
                "notifications",
                FirstSegmentMatcher::new(&["notifications"]),
                ServiceId::Notification,
            ),
            ServiceRule::new(
                "presence",
                FirstSegmentMatcher::new(&["presence"]),
                ServiceId::Presence,
            ),
            ServiceRule::new(
                "groups",
                FirstSegmentMatcher::new(&["group", "groups"]),
                ServiceId::Group,
            ),
            ServiceRule::new(
                "files",
                FirstSegmentMatcher::new(&["files", "media"]),
                ServiceId::File,
            ),
            ServiceRule::new("default", AnyMatcher, ServiceId::General),
        ];

        let websocket_services = vec![
            ServiceRule::new(
                "messages-ws",
                SegmentPrefixMatcher::new("messages/ws"),
                ServiceId::Group,
            ),
            ServiceRule::new(
                "presence-ws",
                SegmentPrefixMatcher::new("presence/ws"),
                ServiceId::Presence,
            ),
        ];

        Self {
            method_overrides,
            auth_endpoints: ExactPathMatcher::new(AUTH_ENDPOINTS),
            services,
            websocket_services,
        }
    }

    /// Classify one request. Never fails.
    pub fn classify(&self, method: &Method, raw_path: &str, headers: &HeaderMap) -> RouteDecision {
        let path = normalize_path(raw_path);
        let inbound = RouteInput::new(&path, method);

        let effective = self
            .method_overrides
            .iter()
            .find(|o| o.matcher.matches(&inbound))
            .map(|o| o.method.clone())
            .unwrap_or_else(|| method.clone());
        let input = RouteInput::new(&path, &effective);

        let is_auth_endpoint = self.auth_endpoints.matches(&input);
        let is_websocket = is_websocket_upgrade(headers);

        let websocket_rule = if is_websocket {
            self.websocket_services.iter().find(|r| r.matcher.matches(&input))
        } else {
            None
        };

        let (rule, service) = websocket_rule
            .or_else(|| self.services.iter().find(|r| r.matcher.matches(&input)))
            .map(|r| (r.name, r.service))
            .unwrap_or(("default", ServiceId::General));

        tracing::debug!(
            path = %path,
            method = %effective,
            rule,
            service = %service,
            websocket = is_websocket,
            auth_endpoint = is_auth_endpoint,
            "Classified request"
        );

        RouteDecision {
            service,
            path,
            is_file_request: service == ServiceId::File,
            method: effective,
            is_websocket,
            is_auth_endpoint,
        }
    }
}

/// Canonical routing path: dot segments resolved, leading slashes and one
/// routing-layer prefix stripped.
pub fn normalize_path(raw: &str) -> String {
    let resolved = resolve_dot_segments(raw);
    let path = resolved.trim_start_matches('/');
    for prefix in ROUTING_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            if rest.is_empty() {
                return String::new();
            }
            if let Some(rest) = rest.strip_prefix('/') {
                return rest.trim_start_matches('/').to_string();
            }
        }
    }
    path.to_string()
}

/// `.` or its percent-encoded form.
fn is_single_dot(segment: &str) -> bool {
    segment == "." || segment.eq_ignore_ascii_case("%2e")
}

/// `..` in any mix of literal and percent-encoded dots.
fn is_double_dot(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        ".." | ".%2e" | "%2e." | "%2e%2e"
    )
}

/// Treat `\` as a separator and apply `.`/`..` the way URL parsers do,
/// never climbing above the root.
fn resolve_dot_segments(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_dot = false;

    for segment in unified.split('/') {
        trailing_dot = false;
        if is_single_dot(segment) {
            trailing_dot = true;
        } else if is_double_dot(segment) {
            // Keep the leading empty segment so the root stays anchored.
            if segments.len() > 1 || segments.first().is_some_and(|s| !s.is_empty()) {
                segments.pop();
            }
            trailing_dot = true;
        } else {
            segments.push(segment);
        }
    }
    if trailing_dot {
        segments.push("");
    }
    segments.join("/")
}

/// The path still holds a backslash or a dot segment.
pub(crate) fn has_unsafe_segments(path: &str) -> bool {
    path.contains('\\')
        || path
            .split('/')
            .any(|segment| is_single_dot(segment) || is_double_dot(segment))
}

/// `Connection` contains "upgrade" and `Upgrade` is "websocket".
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("upgrade"));

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    connection_upgrade && upgrade_websocket
}
