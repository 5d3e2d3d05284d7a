//! Token refresh failure taxonomy.
//!
//! Every way a refresh can fail collapses into one of four conditions. The
//! request pipeline only branches on [`RefreshFailure::Missing`] (continue as
//! a guest) versus everything else (log out and cancel).

/// Why an access token could not be made fresh.
///
/// `Clone` so one single-flight outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    /// The server reports there is no refresh cookie; proceed as a guest.
    #[error("No refresh session present")]
    Missing,

    /// A refresh is cooling down after a failure, or the server rejected it
    /// with a non-specific 400/401.
    #[error("Token refresh unavailable")]
    Unavailable,

    /// Transport or server failure while refreshing.
    #[error("Token refresh failed: {message}")]
    Error {
        /// Description of the failure.
        message: String,
    },

    /// The refresh succeeded but the body lacked a usable token.
    #[error("Invalid refresh response: {message}")]
    Invalid {
        /// What was wrong with the body.
        message: String,
    },
}

impl RefreshFailure {
    /// Creates a new `Error` failure.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Creates a new `Invalid` failure.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "REFRESH_MISSING",
            Self::Unavailable => "REFRESH_UNAVAILABLE",
            Self::Error { .. } => "REFRESH_ERROR",
            Self::Invalid { .. } => "REFRESH_INVALID",
        }
    }

    /// Returns `true` when the caller should continue unauthenticated.
    #[must_use]
    pub fn is_missing_session(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RefreshFailure::Missing.code(), "REFRESH_MISSING");
        assert_eq!(RefreshFailure::Unavailable.code(), "REFRESH_UNAVAILABLE");
        assert_eq!(RefreshFailure::error("boom").code(), "REFRESH_ERROR");
        assert_eq!(RefreshFailure::invalid("no token").code(), "REFRESH_INVALID");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RefreshFailure::error("HTTP 502").to_string(),
            "Token refresh failed: HTTP 502"
        );
        assert_eq!(
            RefreshFailure::invalid("missing accessToken").to_string(),
            "Invalid refresh response: missing accessToken"
        );
    }

    #[test]
    fn test_only_missing_degrades_to_guest() {
        assert!(RefreshFailure::Missing.is_missing_session());
        assert!(!RefreshFailure::Unavailable.is_missing_session());
        assert!(!RefreshFailure::error("x").is_missing_session());
    }
}
