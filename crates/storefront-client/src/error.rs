//! Client error types.
//!
//! Callers see exactly three shapes: a response, a [`ClientError::Cancelled`]
//! (superseded, aborted or logged out; never an application failure), or
//! the original failure of the call.

use std::fmt;

use storefront_core::CoreError;

/// Why a request was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer request with the same canonical key replaced this one.
    Superseded,
    /// The caller's own cancellation token fired.
    External,
    /// The access token could not be refreshed and the session was ended.
    AuthFailed,
    /// A logout cancelled every pending request.
    Logout,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superseded => write!(f, "superseded"),
            Self::External => write!(f, "aborted"),
            Self::AuthFailed => write!(f, "auth_failed"),
            Self::Logout => write!(f, "logout"),
        }
    }
}

/// Errors returned by the request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request was cancelled before it produced a usable result.
    #[error("Request cancelled: {reason}")]
    Cancelled { reason: CancelReason },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create a new Cancelled error
    pub fn cancelled(reason: CancelReason) -> Self {
        Self::Cancelled { reason }
    }

    /// Create a new Http error
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Cancellations are not application errors and should not be shown to users.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled { reason } => Some(*reason),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Convenience result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification() {
        let err = ClientError::cancelled(CancelReason::Superseded);
        assert!(err.is_cancellation());
        assert_eq!(err.cancel_reason(), Some(CancelReason::Superseded));
        assert_eq!(err.to_string(), "Request cancelled: superseded");

        let err = ClientError::http(500, "boom");
        assert!(!err.is_cancellation());
        assert_eq!(err.cancel_reason(), None);
    }

    #[test]
    fn test_http_status_helpers() {
        let err = ClientError::http(401, "");
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));

        assert!(!ClientError::http(403, "").is_unauthorized());
        assert_eq!(ClientError::Transport("reset".into()).status(), None);
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: ClientError = CoreError::invalid_header("x-cart: bad value").into();
        assert_eq!(err.to_string(), "Invalid header: x-cart: bad value");
    }
}
