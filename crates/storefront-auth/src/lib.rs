//! # storefront-auth
//!
//! Access-token lifecycle for the storefront client.
//!
//! ## Modules
//!
//! - [`session`] - Shared authentication state read by the request pipeline
//! - [`refresh`] - Refresh endpoint client and response classification
//! - [`lifecycle`] - Freshness checks, single-flight refresh and failure cooldown
//! - [`error`] - Refresh failure taxonomy

pub mod error;
pub mod lifecycle;
pub mod refresh;
pub mod session;

pub use error::RefreshFailure;
pub use lifecycle::{TokenLifecycle, TokenLifecycleConfig, TokenPhase};
pub use refresh::{RefreshClient, RefreshedToken, Refresher, classify_failure};
pub use session::{MemorySessionStore, Session, SessionStore};

/// Type alias for refresh results.
pub type RefreshResult<T> = Result<T, RefreshFailure>;
