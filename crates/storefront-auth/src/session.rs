//! Shared authentication state.
//!
//! The session store is the one place the access token lives. Readers take a
//! cheap [`Arc`] snapshot; writers swap in a new snapshot atomically, so a
//! request attaching a bearer header never observes a half-written session.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

/// Point-in-time view of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Whether a user is signed in. A signed-in user may still hold a stale
    /// or absent token.
    pub authenticated: bool,
    pub access_token: Option<String>,
    /// Instant after which the token must be refreshed before use.
    pub expires_at: Option<Instant>,
}

impl Session {
    fn signed_in(token: String, expires_at: Instant) -> Self {
        Self {
            authenticated: true,
            access_token: Some(token),
            expires_at: Some(expires_at),
        }
    }
}

/// The global authentication/session store.
pub trait SessionStore: Send + Sync {
    fn snapshot(&self) -> Arc<Session>;

    /// Records a successful login.
    fn sign_in(&self, token: String, expires_at: Instant);

    /// Publishes a refreshed token. Ignored when nobody is signed in any
    /// more, so a refresh that finishes after logout cannot resurrect the
    /// session. Returns whether the token was stored.
    fn publish_token(&self, token: String, expires_at: Instant) -> bool;

    /// Forgets the user and the token.
    fn clear(&self);

    fn is_authenticated(&self) -> bool {
        self.snapshot().authenticated
    }

    fn access_token(&self) -> Option<String> {
        self.snapshot().access_token.clone()
    }
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: ArcSwap<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that starts signed in, e.g. from a persisted login.
    pub fn signed_in(token: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            state: ArcSwap::from_pointee(Session::signed_in(token.into(), expires_at)),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl SessionStore for MemorySessionStore {
    fn snapshot(&self) -> Arc<Session> {
        self.state.load_full()
    }

    fn sign_in(&self, token: String, expires_at: Instant) {
        self.state
            .store(Arc::new(Session::signed_in(token, expires_at)));
        tracing::info!("Session signed in");
    }

    fn publish_token(&self, token: String, expires_at: Instant) -> bool {
        let previous = self.state.rcu(|current| {
            if current.authenticated {
                Arc::new(Session::signed_in(token.clone(), expires_at))
            } else {
                Arc::clone(current)
            }
        });
        previous.authenticated
    }

    fn clear(&self) {
        self.state.store(Arc::new(Session::default()));
        tracing::info!("Session cleared");
    }
}
