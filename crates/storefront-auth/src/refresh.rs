//! Refresh endpoint client.
//!
//! The refresh call is credential-bearing: the refresh token travels as an
//! HTTP-only cookie held by the shared [`reqwest::Client`] cookie store, and
//! the response carries a new short-lived access token.
//!
//! # Response classification
//!
//! | Response | Outcome |
//! |----------|---------|
//! | 2xx with `accessToken` | [`RefreshedToken`] |
//! | 2xx without `accessToken` | [`RefreshFailure::Invalid`] |
//! | non-2xx whose message says the refresh cookie is missing | [`RefreshFailure::Missing`] |
//! | other 400 / 401 | [`RefreshFailure::Unavailable`] |
//! | anything else, including transport errors | [`RefreshFailure::Error`] |

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::RefreshResult;
use crate::error::RefreshFailure;

/// A freshly issued access token.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Server-declared lifetime, when the response includes one.
    pub expires_in: Option<Duration>,
}

/// Performs one refresh round-trip.
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self) -> RefreshResult<RefreshedToken>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    access_token_expires_in: Option<f64>,
}

/// [`Refresher`] backed by the refresh HTTP endpoint.
#[derive(Debug, Clone)]
pub struct RefreshClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RefreshClient {
    /// `http` should be the client whose cookie store holds the refresh cookie.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Refresher for RefreshClient {
    async fn refresh(&self) -> RefreshResult<RefreshedToken> {
        tracing::debug!(endpoint = %self.endpoint, "Refreshing access token");

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh request failed");
                RefreshFailure::error(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RefreshFailure::error(e.to_string()))?;

        if !status.is_success() {
            let failure = classify_failure(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), code = failure.code(), "Refresh rejected");
            return Err(failure);
        }

        parse_success(&body)
    }
}

/// Maps a non-success refresh response onto the failure taxonomy.
pub fn classify_failure(status: u16, body: &str) -> RefreshFailure {
    if failure_message(body).is_some_and(|m| mentions_missing_refresh_cookie(&m)) {
        return RefreshFailure::Missing;
    }
    match status {
        400 | 401 => RefreshFailure::Unavailable,
        other => RefreshFailure::error(format!("HTTP {other}")),
    }
}

fn parse_success(body: &str) -> RefreshResult<RefreshedToken> {
    let parsed: RefreshResponseBody = serde_json::from_str(body)
        .map_err(|e| RefreshFailure::invalid(format!("unparseable body: {e}")))?;

    let access_token = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RefreshFailure::invalid("missing accessToken"))?;

    let expires_in = parsed
        .access_token_expires_in
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    Ok(RefreshedToken {
        access_token,
        expires_in,
    })
}

/// Pulls `message`, `error` or `detail` out of a JSON failure body, falling
/// back to the raw text.
fn failure_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["message", "error", "detail"]
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::to_string),
        _ => Some(trimmed.to_string()),
    }
}

fn mentions_missing_refresh_cookie(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    if !message.contains("refresh") {
        return false;
    }
    ["missing", "no refresh", "not found", "not present", "absent"]
        .iter()
        .any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cookie_detected_from_message_field() {
        let body = r#"{"message": "Refresh token cookie is missing"}"#;
        assert_eq!(classify_failure(401, body), RefreshFailure::Missing);
    }

    #[test]
    fn test_missing_cookie_detected_from_error_and_detail() {
        assert_eq!(
            classify_failure(400, r#"{"error": "No refresh token"}"#),
            RefreshFailure::Missing
        );
        assert_eq!(
            classify_failure(403, r#"{"detail": "refresh cookie not present"}"#),
            RefreshFailure::Missing
        );
    }

    #[test]
    fn test_missing_cookie_detected_from_plain_text() {
        assert_eq!(
            classify_failure(401, "no refresh cookie"),
            RefreshFailure::Missing
        );
    }

    #[test]
    fn test_other_auth_rejections_are_unavailable() {
        assert_eq!(
            classify_failure(401, r#"{"message": "Refresh token expired"}"#),
            RefreshFailure::Unavailable
        );
        assert_eq!(classify_failure(400, ""), RefreshFailure::Unavailable);
    }

    #[test]
    fn test_server_errors_are_errors() {
        assert_eq!(
            classify_failure(503, "upstream down"),
            RefreshFailure::error("HTTP 503")
        );
    }

    #[test]
    fn test_parse_success_with_lifetime() {
        let token = parse_success(r#"{"accessToken": "abc", "accessTokenExpiresIn": 900}"#).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_parse_success_without_lifetime() {
        let token = parse_success(r#"{"accessToken": "abc"}"#).unwrap();
        assert_eq!(token.expires_in, None);
    }

    #[test]
    fn test_parse_success_without_token_is_invalid() {
        let err = parse_success(r#"{"accessTokenExpiresIn": 900}"#).unwrap_err();
        assert_eq!(err.code(), "REFRESH_INVALID");

        let err = parse_success(r#"{"accessToken": ""}"#).unwrap_err();
        assert_eq!(err.code(), "REFRESH_INVALID");

        let err = parse_success("not json").unwrap_err();
        assert_eq!(err.code(), "REFRESH_INVALID");
    }
}
