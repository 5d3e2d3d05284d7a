//! HTTP transport seam.
//!
//! The pipeline only needs "send this request to this URL". Non-success
//! statuses are returned as ordinary [`ApiResponse`]s; the pipeline decides
//! what counts as a failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use storefront_core::{ApiRequest, CoreError, FormData, FormPart, RequestBody};

use crate::error::{ClientError, Result};

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Converts a non-success response into [`ClientError::Http`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ClientError::http(self.status.as_u16(), self.text()))
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Builds the shared HTTP client. The cookie store carries the HTTP-only
/// refresh cookie between requests.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::configuration(format!("failed to build HTTP client: {e}")))
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse> {
        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }

        builder = match request.body_ref() {
            None => builder,
            Some(RequestBody::Json(value)) => {
                builder.body(serde_json::to_vec(value).map_err(CoreError::from)?)
            }
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
            Some(RequestBody::Multipart(parts)) => builder.multipart(build_form(parts)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(
            method = %request.method(),
            url,
            status = status.as_u16(),
            "Response received"
        );
        Ok(ApiResponse::new(status, headers, body))
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form> {
    parts.iter().try_fold(Form::new(), |form, part| {
        let mut field = match &part.data {
            FormData::Text(text) => Part::text(text.clone()),
            FormData::Bytes(bytes) => Part::bytes(bytes.clone()),
        };
        if let Some(file_name) = &part.file_name {
            field = field.file_name(file_name.clone());
        }
        if let Some(content_type) = &part.content_type {
            field = field
                .mime_str(content_type)
                .map_err(|e| ClientError::Transport(format!("invalid part content type: {e}")))?;
        }
        Ok(form.part(part.name.clone(), field))
    })
}
