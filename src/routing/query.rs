//! Query-string parameters.
//!
//! Values are always strings; a key repeated in the inbound query becomes a
//! list. Insertion order is kept so resolved URLs are deterministic.

use serde::Serialize;
use url::form_urlencoded;

/// A single query value or a list of values for a repeated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
}

impl QueryValue {
    /// All values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::List(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Values joined by commas.
    pub fn joined(&self) -> String {
        self.values().join(",")
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                *self = QueryValue::List(vec![std::mem::take(first), value]);
            }
            QueryValue::List(vs) => vs.push(value),
        }
    }
}

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    /// Parse a raw (still percent-encoded) query string.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params = Self::default();
        if let Some(raw) = raw {
            for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
                params.insert(key.into_owned(), value.into_owned());
            }
        }
        params
    }

    /// Add a value, turning a repeated key into a list.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((key, QueryValue::Single(value))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Standard form encoding of every parameter except `skip`.
    /// List values repeat their key.
    pub fn encode_except(&self, skip: &[&str]) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.iter().filter(|(k, _)| !skip.contains(k)) {
            for v in value.values() {
                serializer.append_pair(key, v);
            }
        }
        serializer.finish()
    }

    /// Standard form encoding of every parameter.
    pub fn encode(&self) -> String {
        self.encode_except(&[])
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::default();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
