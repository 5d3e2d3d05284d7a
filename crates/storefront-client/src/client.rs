//! The request pipeline entry point.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use storefront_auth::{MemorySessionStore, RefreshClient, Refresher, SessionStore, TokenLifecycle};
use storefront_core::{
    ApiRequest, CanonicalKey, SharedClock, canonicalize, resolve_url, system_clock,
};
use tokio_util::sync::CancellationToken;

use crate::bypass::BypassRoutes;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::logout::{LogoutCoordinator, LogoutMode};
use crate::registry::PendingRegistry;
use crate::transport::{ApiResponse, HttpTransport, ReqwestTransport, build_http_client};

pub(crate) struct ClientInner {
    pub(crate) base_url: String,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) lifecycle: TokenLifecycle,
    pub(crate) registry: Arc<PendingRegistry>,
    pub(crate) logout: LogoutCoordinator,
    pub(crate) bypass: BypassRoutes,
    pub(crate) guest_session_path: String,
}

/// Deduplicating, token-refreshing HTTP client.
///
/// Cheap to clone; clones share the pending-request registry, the token
/// lifecycle and the session store.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("pending", &self.inner.registry.pending())
            .field("lifecycle", &self.inner.lifecycle)
            .finish()
    }
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Sends `request` through the pipeline.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Cancelled`] when superseded by a newer request with the
    ///   same canonical key, when the session ended, or when the token could
    ///   not be refreshed.
    /// - [`ClientError::Http`] for non-success responses, including a 401 that
    ///   survived its single retry.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.execute_inner(request, None).await
    }

    /// Like [`execute`](Self::execute), additionally aborted when `cancel` fires.
    pub async fn execute_cancellable(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        self.execute_inner(request, Some(cancel)).await
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.execute(request).await?.json()
    }

    pub async fn execute_json_cancellable<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.execute_cancellable(request, cancel).await?.json()
    }

    async fn execute_inner(
        &self,
        request: ApiRequest,
        external: Option<&CancellationToken>,
    ) -> Result<ApiResponse> {
        let mut call = self.inner.register(request, external);
        let _settle = self.inner.settle_guard(call.id);
        self.inner.run(&mut call).await
    }

    /// Asks the server for an anonymous session (cart cookie and the like).
    pub async fn bootstrap_guest_session(&self) -> Result<ApiResponse> {
        self.execute(ApiRequest::post(self.inner.guest_session_path.clone()))
            .await
    }

    /// Records a login performed by an external flow.
    pub fn sign_in(&self, access_token: impl Into<String>, lifetime: Duration) {
        self.inner.lifecycle.sign_in(access_token, lifetime);
    }

    /// User-initiated logout: ends the server session, clears local state and
    /// cancels every pending request.
    pub async fn logout(&self) {
        self.inner.logout.logout(LogoutMode::Full).await;
    }

    pub fn lifecycle(&self) -> &TokenLifecycle {
        &self.inner.lifecycle
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        self.inner.lifecycle.session()
    }

    /// Number of canonical keys with a request in flight.
    pub fn pending_requests(&self) -> usize {
        self.inner.registry.pending()
    }

    pub fn canonical_key(&self, request: &ApiRequest) -> CanonicalKey {
        let mut request = request.clone();
        request.normalize_content_type();
        canonicalize(&request, &self.inner.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }
}

/// Assembles an [`ApiClient`]. The session store and clock default to an
/// in-memory store and the system clock.
pub struct ApiClientBuilder {
    config: ClientConfig,
    session: Option<Arc<dyn SessionStore>>,
    clock: Option<SharedClock>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
            clock: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        self.config
            .validate()
            .map_err(ClientError::Configuration)?;

        let config = self.config;
        let base_url = config.api.base_url.clone();
        // One reqwest client so the refresh call sees the session cookies.
        let http = build_http_client(config.timeout())?;
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(http.clone()));
        let refresher: Arc<dyn Refresher> = Arc::new(RefreshClient::new(
            http,
            resolve_url(&base_url, &config.auth.refresh_path),
        ));
        let session: Arc<dyn SessionStore> = match self.session {
            Some(session) => session,
            None => MemorySessionStore::shared(),
        };
        let clock = self.clock.unwrap_or_else(system_clock);

        let lifecycle = TokenLifecycle::new(session, refresher, clock, config.lifecycle());
        let registry = Arc::new(PendingRegistry::new());
        let logout = LogoutCoordinator::new(
            lifecycle.clone(),
            Arc::clone(&registry),
            Arc::clone(&transport),
            resolve_url(&base_url, &config.auth.logout_path),
        );

        tracing::debug!(base_url = %base_url, "API client configured");

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                bypass: BypassRoutes::new(config.bypass_paths()),
                guest_session_path: config.auth.guest_session_path.clone(),
                base_url,
                transport,
                lifecycle,
                registry,
                logout,
            }),
        })
    }
}
