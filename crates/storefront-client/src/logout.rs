//! Single-flight logout.
//!
//! Concurrent triggers share one in-flight logout. A running full logout
//! also satisfies guest requests; a guest logout in progress does not satisfy
//! a full one, which runs after it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use storefront_auth::TokenLifecycle;
use storefront_core::ApiRequest;

use crate::registry::PendingRegistry;
use crate::transport::HttpTransport;

type LogoutFlight = Shared<BoxFuture<'static, ()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutMode {
    /// Client-side only. Used when there is no server session to end.
    Guest,
    /// Notifies the server and cancels every pending request.
    Full,
}

impl LogoutMode {
    fn covers(self, requested: LogoutMode) -> bool {
        self == LogoutMode::Full || requested == LogoutMode::Guest
    }
}

struct LogoutInner {
    lifecycle: TokenLifecycle,
    registry: Arc<PendingRegistry>,
    transport: Arc<dyn HttpTransport>,
    logout_url: String,
    in_flight: Mutex<Option<(LogoutMode, LogoutFlight)>>,
    completed: AtomicU64,
}

impl LogoutInner {
    async fn notify_server(&self) {
        let mut request = ApiRequest::post(self.logout_url.clone());
        request.normalize_content_type();
        request.set_bearer(self.lifecycle.session().access_token().as_deref());

        match self.transport.send(&self.logout_url, &request).await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Server session ended");
            }
            Ok(response) => {
                tracing::warn!(status = response.status().as_u16(), "Server logout rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Server logout failed");
            }
        }
    }
}

#[derive(Clone)]
pub struct LogoutCoordinator {
    inner: Arc<LogoutInner>,
}

impl LogoutCoordinator {
    pub fn new(
        lifecycle: TokenLifecycle,
        registry: Arc<PendingRegistry>,
        transport: Arc<dyn HttpTransport>,
        logout_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(LogoutInner {
                lifecycle,
                registry,
                transport,
                logout_url: logout_url.into(),
                in_flight: Mutex::new(None),
                completed: AtomicU64::new(0),
            }),
        }
    }

    /// Logs out, joining a compatible logout already in progress.
    pub async fn logout(&self, mode: LogoutMode) {
        loop {
            let (flight, covered) = {
                let mut slot = self.inner.in_flight.lock();
                match slot.as_ref() {
                    Some((running, flight)) => (flight.clone(), running.covers(mode)),
                    None => {
                        let flight = self.start(mode);
                        *slot = Some((mode, flight.clone()));
                        (flight, true)
                    }
                }
            };
            flight.await;
            if covered {
                return;
            }
        }
    }

    /// Spawns the logout task. Must be called with the in-flight slot locked.
    fn start(&self, mode: LogoutMode) -> LogoutFlight {
        let inner = Arc::clone(&self.inner);
        tracing::info!(?mode, "Logging out");

        let task = tokio::spawn(async move {
            if mode == LogoutMode::Full {
                inner.notify_server().await;
            }
            inner.lifecycle.session().clear();
            inner.lifecycle.reset();
            if mode == LogoutMode::Full {
                inner.registry.cancel_all();
            }
            inner.completed.fetch_add(1, Ordering::Relaxed);
            inner.in_flight.lock().take();
        });

        async move {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Logout task aborted");
            }
        }
        .boxed()
        .shared()
    }

    /// Number of logout actions that ran to completion.
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::transport::ApiResponse;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use std::time::{Duration, Instant};
    use storefront_auth::{
        MemorySessionStore, RefreshFailure, RefreshedToken, Refresher, SessionStore,
        TokenLifecycleConfig,
    };
    use storefront_core::{RequestId, canonicalize, system_clock};
    use tokio_util::sync::CancellationToken;

    struct NoRefresh;

    #[async_trait]
    impl Refresher for NoRefresh {
        async fn refresh(&self) -> std::result::Result<RefreshedToken, RefreshFailure> {
            Err(RefreshFailure::Unavailable)
        }
    }

    #[derive(Default)]
    struct SlowTransport {
        calls: AtomicU64,
    }

    #[async_trait]
    impl HttpTransport for SlowTransport {
        async fn send(&self, _url: &str, _request: &ApiRequest) -> Result<ApiResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(ApiResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Vec::new()))
        }
    }

    fn coordinator() -> (LogoutCoordinator, Arc<MemorySessionStore>, Arc<PendingRegistry>, Arc<SlowTransport>) {
        let session = Arc::new(MemorySessionStore::signed_in(
            "tok",
            Instant::now() + Duration::from_secs(600),
        ));
        let lifecycle = TokenLifecycle::new(
            session.clone(),
            Arc::new(NoRefresh),
            system_clock(),
            TokenLifecycleConfig::default(),
        );
        let registry = Arc::new(PendingRegistry::new());
        let transport = Arc::new(SlowTransport::default());
        let coordinator = LogoutCoordinator::new(
            lifecycle,
            registry.clone(),
            transport.clone(),
            "http://localhost/api/auth/logout",
        );
        (coordinator, session, registry, transport)
    }

    #[tokio::test]
    async fn test_guest_logout_is_client_side_only() {
        let (coordinator, session, registry, transport) = coordinator();
        let pending = CancellationToken::new();
        registry.register(
            canonicalize(&ApiRequest::get("/cart"), "http://localhost/api"),
            RequestId::generate(),
            pending.clone(),
        );

        coordinator.logout(LogoutMode::Guest).await;

        assert!(!session.is_authenticated());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(!pending.is_cancelled());
    }

    #[tokio::test]
    async fn test_full_logout_notifies_server_and_cancels_pending() {
        let (coordinator, session, registry, transport) = coordinator();
        let pending = CancellationToken::new();
        registry.register(
            canonicalize(&ApiRequest::get("/cart"), "http://localhost/api"),
            RequestId::generate(),
            pending.clone(),
        );

        coordinator.logout(LogoutMode::Full).await;

        assert!(!session.is_authenticated());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(pending.is_cancelled());
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_logouts_share_one_action() {
        let (coordinator, _session, _registry, transport) = coordinator();

        let triggers: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.logout(LogoutMode::Full).await })
            })
            .collect();
        for trigger in triggers {
            trigger.await.unwrap();
        }

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.completed(), 1);
    }

    #[tokio::test]
    async fn test_full_logout_after_running_guest_logout_still_runs() {
        let (coordinator, _session, _registry, transport) = coordinator();

        let guest = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.logout(LogoutMode::Guest).await })
        };
        coordinator.logout(LogoutMode::Full).await;
        guest.await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
