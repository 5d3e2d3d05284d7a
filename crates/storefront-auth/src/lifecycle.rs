//! Access-token lifecycle manager.
//!
//! [`TokenLifecycle::ensure_fresh_token`] is called before every
//! non-bypass request. It keeps three guarantees:
//!
//! - **Single-flight**: at most one refresh call is outstanding process-wide.
//!   Concurrent callers await the same shared outcome.
//! - **Cooldown**: after a failed refresh no further refresh is attempted
//!   until `refresh_cooldown` has elapsed; callers fail fast with
//!   [`RefreshFailure::Unavailable`].
//! - **Guests are free**: when nobody is signed in nothing happens.
//!
//! ## States
//!
//! ```text
//! Anonymous ──sign_in──▶ Fresh ──expiry──▶ Stale ──ensure──▶ Refreshing
//!                          ▲                                   │    │
//!                          └──────────────ok───────────────────┘    │ err
//!                                                                    ▼
//!                                   Stale ◀──cooldown elapsed── CooledDown
//! ```
//!
//! The refresh runs on its own task so that a caller giving up (for example
//! a superseded request) never aborts a refresh other callers depend on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use storefront_core::time::{SharedClock, is_before};

use crate::RefreshResult;
use crate::error::RefreshFailure;
use crate::refresh::Refresher;
use crate::session::{Session, SessionStore};

type RefreshFlight = Shared<BoxFuture<'static, RefreshResult<()>>>;

/// Tuning for the token lifecycle.
#[derive(Debug, Clone)]
pub struct TokenLifecycleConfig {
    /// Subtracted from the server-declared lifetime so tokens are refreshed
    /// shortly before they actually expire (default: 30 seconds).
    pub expiry_skew: Duration,

    /// How long refreshes are suppressed after a failure (default: 30 seconds).
    pub refresh_cooldown: Duration,

    /// Lifetime assumed when the refresh response omits one (default: 15 minutes).
    pub default_token_lifetime: Duration,
}

impl Default for TokenLifecycleConfig {
    fn default() -> Self {
        Self {
            expiry_skew: Duration::from_secs(30),
            refresh_cooldown: Duration::from_secs(30),
            default_token_lifetime: Duration::from_secs(900),
        }
    }
}

impl TokenLifecycleConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expiry skew.
    #[must_use]
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.expiry_skew = skew;
        self
    }

    /// Sets the failure cooldown.
    #[must_use]
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Sets the fallback token lifetime.
    #[must_use]
    pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_token_lifetime = lifetime;
        self
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPhase {
    /// Nobody is signed in.
    Anonymous,
    /// Signed in with a token that is still usable.
    Fresh,
    /// Signed in, token expired or absent, no refresh running.
    Stale,
    /// A refresh call is outstanding.
    Refreshing,
    /// A refresh failed recently; refreshes are suppressed.
    CooledDown,
}

struct LifecycleInner {
    session: Arc<dyn SessionStore>,
    refresher: Arc<dyn Refresher>,
    clock: SharedClock,
    config: TokenLifecycleConfig,
    in_flight: Mutex<Option<RefreshFlight>>,
    hard_failed_until: Mutex<Option<Instant>>,
    refresh_calls: AtomicU64,
}

impl LifecycleInner {
    fn is_fresh(&self, session: &Session) -> bool {
        session.access_token.is_some() && is_before(self.clock.as_ref(), session.expires_at)
    }

    fn cooling_down(&self) -> bool {
        is_before(self.clock.as_ref(), *self.hard_failed_until.lock())
    }

    fn expiry_for(&self, lifetime: Duration) -> Instant {
        self.clock.now() + lifetime.saturating_sub(self.config.expiry_skew)
    }
}

/// Process-wide owner of access-token freshness.
#[derive(Clone)]
pub struct TokenLifecycle {
    inner: Arc<LifecycleInner>,
}

impl std::fmt::Debug for TokenLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycle")
            .field("config", &self.inner.config)
            .field("phase", &self.phase())
            .finish()
    }
}

impl TokenLifecycle {
    pub fn new(
        session: Arc<dyn SessionStore>,
        refresher: Arc<dyn Refresher>,
        clock: SharedClock,
        config: TokenLifecycleConfig,
    ) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                session,
                refresher,
                clock,
                config,
                in_flight: Mutex::new(None),
                hard_failed_until: Mutex::new(None),
                refresh_calls: AtomicU64::new(0),
            }),
        }
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.inner.session
    }

    pub fn config(&self) -> &TokenLifecycleConfig {
        &self.inner.config
    }

    /// Makes sure a signed-in caller holds a usable token.
    ///
    /// # Errors
    ///
    /// - [`RefreshFailure::Unavailable`] immediately, without I/O, while the
    ///   failure cooldown is active.
    /// - Whatever the shared refresh failed with otherwise. The same failure
    ///   is delivered to every caller that joined that refresh.
    pub async fn ensure_fresh_token(&self) -> RefreshResult<()> {
        let session = self.inner.session.snapshot();
        if !session.authenticated || self.inner.is_fresh(&session) {
            return Ok(());
        }

        let flight = {
            let mut slot = self.inner.in_flight.lock();
            if self.inner.cooling_down() {
                tracing::debug!("Token refresh suppressed by cooldown");
                return Err(RefreshFailure::Unavailable);
            }
            match slot.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    let flight = self.start_refresh();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Spawns the refresh task. Must be called with the in-flight slot locked.
    fn start_refresh(&self) -> RefreshFlight {
        let inner = Arc::clone(&self.inner);
        inner.refresh_calls.fetch_add(1, Ordering::Relaxed);

        let task = tokio::spawn(async move {
            let result = match inner.refresher.refresh().await {
                Ok(token) => {
                    let lifetime = token
                        .expires_in
                        .unwrap_or(inner.config.default_token_lifetime);
                    let expires_at = inner.expiry_for(lifetime);
                    if !inner.session.publish_token(token.access_token, expires_at) {
                        tracing::debug!("Session ended during refresh; token discarded");
                    }
                    *inner.hard_failed_until.lock() = None;
                    tracing::debug!(lifetime_secs = lifetime.as_secs(), "Access token refreshed");
                    Ok(())
                }
                Err(failure) => {
                    let cooldown = inner.config.refresh_cooldown;
                    *inner.hard_failed_until.lock() = Some(inner.clock.now() + cooldown);
                    tracing::warn!(
                        code = failure.code(),
                        error = %failure,
                        cooldown_secs = cooldown.as_secs(),
                        "Token refresh failed; cooling down"
                    );
                    Err(failure)
                }
            };
            inner.in_flight.lock().take();
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(RefreshFailure::error(format!("refresh task aborted: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    /// Records a login performed elsewhere, deriving the expiry the same way
    /// a refresh does.
    pub fn sign_in(&self, token: impl Into<String>, lifetime: Duration) {
        let expires_at = self.inner.expiry_for(lifetime);
        self.inner.session.sign_in(token.into(), expires_at);
        self.reset();
    }

    /// Marks `rejected` as expired if it is still the current token, so the
    /// next [`ensure_fresh_token`](Self::ensure_fresh_token) refreshes it.
    /// A token already replaced by a concurrent refresh is left alone.
    pub fn invalidate(&self, rejected: &str) -> bool {
        let session = self.inner.session.snapshot();
        match session.access_token.as_deref() {
            Some(current) if current == rejected => {
                self.inner
                    .session
                    .publish_token(current.to_string(), self.inner.clock.now())
            }
            _ => false,
        }
    }

    /// Clears the failure cooldown.
    pub fn reset(&self) {
        self.inner.hard_failed_until.lock().take();
    }

    pub fn phase(&self) -> TokenPhase {
        let session = self.inner.session.snapshot();
        if !session.authenticated {
            TokenPhase::Anonymous
        } else if self.inner.in_flight.lock().is_some() {
            TokenPhase::Refreshing
        } else if self.inner.cooling_down() {
            TokenPhase::CooledDown
        } else if self.inner.is_fresh(&session) {
            TokenPhase::Fresh
        } else {
            TokenPhase::Stale
        }
    }

    /// Number of refresh calls started since creation.
    pub fn refresh_calls(&self) -> u64 {
        self.inner.refresh_calls.load(Ordering::Relaxed)
    }
}
