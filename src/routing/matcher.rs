//! Route matching predicates.
//!
//! # Responsibilities
//! - Match the normalized path by segment, prefix or substring
//! - Match the effective method
//! - Combine conditions with AND / OR semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Segment literals accept a set of spellings (`message` | `messages`)
//! - No regex to guarantee O(n) matching

use axum::http::Method;

/// The parts of a request a rule may look at.
#[derive(Debug, Clone)]
pub struct RouteInput<'a> {
    pub path: &'a str,
    pub segments: Vec<&'a str>,
    pub method: &'a Method,
}

impl<'a> RouteInput<'a> {
    pub fn new(path: &'a str, method: &'a Method) -> Self {
        let segments = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };
        Self {
            path,
            segments,
            method,
        }
    }

    /// First path segment, or "" for the empty path.
    pub fn first_segment(&self) -> &'a str {
        self.segments.first().copied().unwrap_or("")
    }
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, input: &RouteInput<'_>) -> bool;
}

/// Matches when the first segment is one of the given literals.
#[derive(Debug, Clone)]
pub struct FirstSegmentMatcher {
    literals: &'static [&'static str],
}

impl FirstSegmentMatcher {
    pub fn new(literals: &'static [&'static str]) -> Self {
        Self { literals }
    }
}

impl Matcher for FirstSegmentMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        self.literals.contains(&input.first_segment())
    }
}

/// Matches when the path contains a substring.
#[derive(Debug, Clone)]
pub struct ContainsMatcher {
    needle: &'static str,
}

impl ContainsMatcher {
    pub fn new(needle: &'static str) -> Self {
        Self { needle }
    }
}

impl Matcher for ContainsMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        input.path.contains(self.needle)
    }
}

/// Matches the whole path against a set of exact values.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    paths: &'static [&'static str],
}

impl ExactPathMatcher {
    pub fn new(paths: &'static [&'static str]) -> Self {
        Self { paths }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        self.paths.contains(&input.path)
    }
}

/// Matches a path prefix on segment boundaries (`messages/ws` matches
/// `messages/ws` and `messages/ws/room`, not `messages/wsx`).
#[derive(Debug, Clone)]
pub struct SegmentPrefixMatcher {
    prefix: &'static str,
}

impl SegmentPrefixMatcher {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }
}

impl Matcher for SegmentPrefixMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        match input.path.strip_prefix(self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Matches when the path ends with the given segments (or equals them).
#[derive(Debug, Clone)]
pub struct SegmentSuffixMatcher {
    suffix: &'static str,
}

impl SegmentSuffixMatcher {
    pub fn new(suffix: &'static str) -> Self {
        Self { suffix }
    }
}

impl Matcher for SegmentSuffixMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        match input.path.strip_suffix(self.suffix) {
            Some(rest) => rest.is_empty() || rest.ends_with('/'),
            None => false,
        }
    }
}

/// One position in a [`SegmentsMatcher`] pattern.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Any of these literal spellings.
    Literal(&'static [&'static str]),
    /// Any single non-empty segment (an id).
    Param,
}

/// Matches the full segment list against a fixed-length pattern.
#[derive(Debug, Clone)]
pub struct SegmentsMatcher {
    pattern: Vec<Segment>,
}

impl SegmentsMatcher {
    pub fn new(pattern: Vec<Segment>) -> Self {
        Self { pattern }
    }
}

impl Matcher for SegmentsMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        input.segments.len() == self.pattern.len()
            && self
                .pattern
                .iter()
                .zip(&input.segments)
                .all(|(pattern, segment)| match pattern {
                    Segment::Literal(options) => options.contains(segment),
                    Segment::Param => !segment.is_empty(),
                })
    }
}

/// `group(s)/.../messages`: a group path with a later `messages` segment.
#[derive(Debug, Clone)]
pub struct GroupMessagesMatcher;

impl Matcher for GroupMessagesMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        matches!(input.first_segment(), "group" | "groups")
            && input.segments.iter().skip(1).any(|s| *s == "messages")
    }
}

/// Matches the effective method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        self.methods.contains(input.method)
    }
}

/// Always matches; terminates a rule table.
#[derive(Debug, Clone)]
pub struct AnyMatcher;

impl Matcher for AnyMatcher {
    fn matches(&self, _input: &RouteInput<'_>) -> bool {
        true
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        self.matchers.iter().all(|m| m.matches(input))
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug)]
pub struct OrMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl OrMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for OrMatcher {
    fn matches(&self, input: &RouteInput<'_>) -> bool {
        self.matchers.iter().any(|m| m.matches(input))
    }
}
