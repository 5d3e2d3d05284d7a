//! Outbound request model.
//!
//! An [`ApiRequest`] is a plain description of a call (`method`, `url`,
//! `query`, `body`, `headers`). It is cheap to clone so the pipeline can
//! resubmit it after a token refresh, and it never carries transport state.

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured JSON payload.
    Json(Value),
    /// Pre-encoded text sent as-is.
    Text(String),
    /// Opaque binary payload.
    Bytes(Vec<u8>),
    /// Multi-part form; the transport chooses the boundary-bearing content type.
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// One field of a multi-part form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: FormData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormData {
    Text(String),
    Bytes(Vec<u8>),
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: FormData::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            data: FormData::Bytes(bytes),
        }
    }
}

/// A description of one outbound HTTP call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Appends a query parameter. Repeating a key produces repeated pairs.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends one pair per value, e.g. `sizes=M&sizes=L`.
    #[must_use]
    pub fn query_all<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let key = key.into();
        for value in values {
            self.query.push((key.clone(), value.to_string()));
        }
        self
    }

    /// Serialises `payload` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        self.body = Some(RequestBody::Json(serde_json::to_value(payload)?));
        Ok(self)
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(RequestBody::Text(text.into()))
    }

    #[must_use]
    pub fn bytes(self, bytes: Vec<u8>) -> Self {
        self.body(RequestBody::Bytes(bytes))
    }

    #[must_use]
    pub fn multipart(self, parts: Vec<FormPart>) -> Self {
        self.body(RequestBody::Multipart(parts))
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CoreError::invalid_header(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| CoreError::invalid_header(format!("{name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body_ref(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Multi-part bodies drop any explicit content type; everything else
    /// defaults to JSON when no content type was set.
    pub fn normalize_content_type(&mut self) {
        if self.body.as_ref().is_some_and(RequestBody::is_multipart) {
            self.headers.remove(CONTENT_TYPE);
        } else if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
    }

    /// Sets or clears the bearer credential.
    pub fn set_bearer(&mut self, token: Option<&str>) {
        match token.and_then(|t| HeaderValue::from_str(&format!("Bearer {t}")).ok()) {
            Some(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            None => {
                self.headers.remove(AUTHORIZATION);
            }
        }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}
