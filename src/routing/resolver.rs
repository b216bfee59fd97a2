//! Upstream URL resolution.
//!
//! # Responsibilities
//! - Canonicalize singular/plural message paths via an ordered rewrite table
//! - Prefix file-service paths with `api/`
//! - Encode query strings, including comma-separated `user_ids` lists
//! - Guarantee a scheme and no duplicate path separators
//!
//! # Design Decisions
//! - Rewrite rules are evaluated before the generic `base/path` rule
//! - Id-based message rules precede suffix rules (`/read`, `/search`, ...)
//! - One repair pass on an invalid URL, then an explicit error

use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::config::ServicesConfig;
use crate::routing::classifier::has_unsafe_segments;
use crate::routing::matcher::{
    AndMatcher, ContainsMatcher, FirstSegmentMatcher, Matcher, MethodMatcher, OrMatcher,
    RouteInput, Segment, SegmentsMatcher,
};
use crate::routing::{QueryParams, RouteDecision, ServiceId};
use axum::http::Method;

const MESSAGE_SPELLINGS: &[&str] = &["message", "messages"];

/// Errors produced while building an upstream URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid upstream URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream URL '{0}' has no host")]
    MissingHost(String),

    #[error("path '{0}' contains a backslash or dot segment")]
    UnsafePath(String),
}

/// How a matched rule changes the upstream path and query.
#[derive(Debug, Clone, Copy)]
enum Rewrite {
    /// Replace a leading `message` segment with `messages`.
    PluralMessages,
    /// `presence/users` with per-id encoding of `user_ids`.
    PresenceUsers,
}

#[derive(Debug)]
struct RewriteRule {
    name: &'static str,
    matcher: Box<dyn Matcher>,
    rewrite: Rewrite,
}

impl RewriteRule {
    fn new(name: &'static str, matcher: impl Matcher + 'static, rewrite: Rewrite) -> Self {
        Self {
            name,
            matcher: Box::new(matcher),
            rewrite,
        }
    }
}

/// Builds absolute upstream URLs from route decisions.
#[derive(Debug)]
pub struct Resolver {
    services: ServicesConfig,
    rewrites: Vec<RewriteRule>,
}

impl Resolver {
    pub fn new(services: &ServicesConfig) -> Self {
        let mut services = services.clone();
        for service in ServiceId::ALL {
            let slot = services.base_url_mut(service);
            *slot = ensure_scheme(slot);
        }

        let message_id = |spellings: &'static [&'static str]| {
            SegmentsMatcher::new(vec![Segment::Literal(spellings), Segment::Param])
        };

        let rewrites = vec![
            RewriteRule::new(
                "message-history",
                SegmentsMatcher::new(vec![
                    Segment::Literal(MESSAGE_SPELLINGS),
                    Segment::Literal(&["history"]),
                ]),
                Rewrite::PluralMessages,
            ),
            RewriteRule::new(
                "message-get",
                AndMatcher::new(vec![
                    Box::new(message_id(&["message"])),
                    Box::new(MethodMatcher::new([Method::GET])),
                ]),
                Rewrite::PluralMessages,
            ),
            RewriteRule::new(
                "message-mutate",
                AndMatcher::new(vec![
                    Box::new(message_id(MESSAGE_SPELLINGS)),
                    Box::new(MethodMatcher::new([Method::DELETE, Method::PUT, Method::PATCH])),
                ]),
                Rewrite::PluralMessages,
            ),
            RewriteRule::new(
                "message-create",
                AndMatcher::new(vec![
                    Box::new(SegmentsMatcher::new(vec![Segment::Literal(MESSAGE_SPELLINGS)])),
                    Box::new(MethodMatcher::new([Method::POST])),
                ]),
                Rewrite::PluralMessages,
            ),
            RewriteRule::new(
                "message-actions",
                AndMatcher::new(vec![
                    Box::new(FirstSegmentMatcher::new(MESSAGE_SPELLINGS)),
                    Box::new(OrMatcher::new(vec![
                        Box::new(ContainsMatcher::new("/read")),
                        Box::new(ContainsMatcher::new("/search")),
                        Box::new(ContainsMatcher::new("/unread-count")),
                    ])),
                ]),
                Rewrite::PluralMessages,
            ),
            RewriteRule::new(
                "presence-users",
                SegmentsMatcher::new(vec![
                    Segment::Literal(&["presence"]),
                    Segment::Literal(&["users"]),
                ]),
                Rewrite::PresenceUsers,
            ),
        ];

        Self { services, rewrites }
    }

    /// Scheme-qualified base URL for a service.
    pub fn base_url(&self, service: ServiceId) -> &str {
        self.services.base_url(service)
    }

    /// Resolve a decision and its query to an absolute URL.
    pub fn resolve(&self, decision: &RouteDecision, query: &QueryParams) -> Result<Url, ResolveError> {
        // URL parsing would rewrite these after the rules below have run.
        if has_unsafe_segments(&decision.path) {
            return Err(ResolveError::UnsafePath(decision.path.clone()));
        }

        let input = RouteInput::new(&decision.path, &decision.method);
        let rule = self.rewrites.iter().find(|r| r.matcher.matches(&input));

        let (mut path, query_string) = match rule.map(|r| r.rewrite) {
            Some(Rewrite::PluralMessages) => (plural_messages(&decision.path), query.encode()),
            Some(Rewrite::PresenceUsers) => (decision.path.clone(), presence_query(query)),
            None => (decision.path.clone(), query.encode()),
        };

        if decision.service == ServiceId::File {
            path = format!("api/{}", path);
        }

        let mut candidate = format!("{}/{}", self.base_url(decision.service), path);
        if !query_string.is_empty() {
            candidate.push('?');
            candidate.push_str(&query_string);
        }

        let url = validate_or_repair(candidate)?;
        tracing::debug!(
            rule = rule.map(|r| r.name).unwrap_or("generic"),
            service = %decision.service,
            url = %url,
            "Resolved upstream URL"
        );
        Ok(url)
    }
}

/// `message/...` → `messages/...`; other paths unchanged.
fn plural_messages(path: &str) -> String {
    match path.strip_prefix("message") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("messages{}", rest),
        _ => path.to_string(),
    }
}

/// Query for `presence/users`: comma-separated ids are encoded one by one
/// and rejoined with literal commas.
fn presence_query(query: &QueryParams) -> String {
    let Some(user_ids) = query.get("user_ids") else {
        return query.encode();
    };
    let raw = user_ids.joined();

    let ids = if raw.contains(',') {
        encode_id_list(&raw).unwrap_or_else(|| {
            tracing::debug!(user_ids = %raw, "Falling back to plain user_ids encoding");
            encode_pair("user_ids", &raw)
        })
    } else {
        encode_pair("user_ids", &raw)
    };

    let rest = query.encode_except(&["user_ids"]);
    if rest.is_empty() {
        ids
    } else {
        format!("{}&{}", ids, rest)
    }
}

/// Encode each comma-separated id on its own. Positions are kept, so an
/// empty id stays empty; `None` when no id has content.
fn encode_id_list(raw: &str) -> Option<String> {
    let ids: Vec<&str> = raw.split(',').map(str::trim).collect();
    if ids.iter().all(|id| id.is_empty()) {
        return None;
    }

    let encoded: Vec<String> = ids
        .iter()
        .map(|id| form_urlencoded::byte_serialize(id.as_bytes()).collect())
        .collect();
    Some(format!("user_ids={}", encoded.join(",")))
}

fn encode_pair(key: &str, value: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish()
}

/// Prefix `http://` when no scheme is present.
fn with_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("http://{}", rest)
    } else {
        format!("http://{}", trimmed)
    }
}

/// Coerce a base URL to carry a scheme and drop trailing slashes.
pub fn ensure_scheme(raw: &str) -> String {
    let url = with_scheme(raw);
    match url.find("://") {
        Some(idx) => {
            let (scheme, rest) = url.split_at(idx + 3);
            format!("{}{}", scheme, rest.trim_end_matches('/'))
        }
        None => url,
    }
}

/// Collapse runs of `/` in the path, leaving `scheme://` and the query alone.
pub fn collapse_slashes(url: &str) -> String {
    let (scheme, rest) = match url.find("://") {
        Some(idx) => url.split_at(idx + 3),
        None => ("", url),
    };
    let (path, query) = match rest.find('?') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    let mut out = String::with_capacity(url.len());
    out.push_str(scheme);
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        out.push(c);
    }
    out.push_str(query);
    out
}

fn parse_with_host(candidate: &str) -> Result<Url, ResolveError> {
    let url = Url::parse(candidate).map_err(|source| ResolveError::InvalidUrl {
        url: candidate.to_string(),
        source,
    })?;
    if url.host_str().is_some_and(|h| !h.is_empty()) {
        Ok(url)
    } else {
        Err(ResolveError::MissingHost(candidate.to_string()))
    }
}

/// Accept `candidate` when it parses with a host and a clean path;
/// otherwise add a missing scheme, collapse slashes and parse once more.
fn validate_or_repair(candidate: String) -> Result<Url, ResolveError> {
    let problem = match parse_with_host(&candidate) {
        Ok(url) if !url.path().contains("//") => return Ok(url),
        Ok(url) => format!("empty path segment in '{}'", url.path()),
        Err(e) => e.to_string(),
    };

    let repaired = collapse_slashes(&with_scheme(&candidate));
    tracing::debug!(url = %candidate, repaired = %repaired, problem = %problem, "Repairing upstream URL");
    parse_with_host(&repaired)
}

/// The WebSocket-scheme form of an upstream URL (`http→ws`, `https→wss`).
pub fn websocket_url(url: &Url) -> Url {
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return url.clone(),
    };
    let mut ws = url.clone();
    if ws.set_scheme(scheme).is_err() {
        return url.clone();
    }
    ws
}
