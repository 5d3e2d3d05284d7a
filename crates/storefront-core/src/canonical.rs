//! Canonical request keys.
//!
//! A [`CanonicalKey`] identifies a logical request independently of how the
//! caller happened to build it: query parameters are sorted by key, JSON
//! bodies are deep-sorted before encoding, and binary payloads collapse to a
//! fixed sentinel. Two requests with the same key are treated as duplicates
//! by the request pipeline, and the newest one wins.
//!
//! ```text
//! METHOD::ABSOLUTE_URL::SORTED_QUERY::BODY
//! ```

use std::fmt;

use reqwest::Method;
use serde_json::{Map, Value};
use url::Url;
use url::form_urlencoded;

use crate::request::{ApiRequest, RequestBody};

/// Body component used for binary-like payloads.
pub const BINARY_BODY_SENTINEL: &str = "[binary]";

const SEPARATOR: &str = "::";

/// Deterministic identity of a request's method, URL, query and body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the canonical key of `request` relative to `base_url`.
pub fn canonicalize(request: &ApiRequest, base_url: &str) -> CanonicalKey {
    let method = request.method().as_str().to_ascii_uppercase();
    let url = resolve_url(base_url, request.url());
    let query = canonical_query(request.query_pairs());
    let body = if carries_body(request.method()) {
        canonical_body(request.body_ref())
    } else {
        String::new()
    };

    CanonicalKey([method, url, query, body].join(SEPARATOR))
}

/// Resolves `url` against `base_url`.
///
/// Absolute URLs are returned verbatim. Relative ones are joined with exactly
/// one slash between base and path.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if is_absolute(url) {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

fn is_absolute(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| u.has_host())
}

/// `GET` and `HEAD` never contribute a body component.
fn carries_body(method: &Method) -> bool {
    !(method == Method::GET || method == Method::HEAD)
}

/// Serialises query pairs sorted by key.
///
/// The sort is stable, so repeated keys keep their relative order
/// (`sizes=M&sizes=L` stays distinct from `sizes=L&sizes=M`).
pub fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted.into_iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

fn canonical_body(body: Option<&RequestBody>) -> String {
    match body {
        None => String::new(),
        Some(RequestBody::Text(text)) => text.clone(),
        Some(RequestBody::Json(value)) => deep_sorted(value).to_string(),
        Some(RequestBody::Bytes(_) | RequestBody::Multipart(_)) => {
            BINARY_BODY_SENTINEL.to_string()
        }
    }
}

/// Returns a copy of `value` with every object's keys in lexicographic order.
/// Array element order is preserved.
pub fn deep_sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), deep_sorted(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(deep_sorted).collect()),
        other => other.clone(),
    }
}
