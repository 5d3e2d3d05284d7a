//! Request and response phases of the pipeline.
//!
//! ```text
//!            ┌──────────── request phase ────────────┐
//! ApiRequest │ normalize content type                │
//!  ────────▶ │ canonicalize, supersede, register     │
//!            │ ensure_fresh_token (unless bypass)    │
//!            │   ok ──────▶ attach bearer            │
//!            │   missing ─▶ guest logout, no bearer  │
//!            │   other ───▶ full logout, Cancelled   │
//!            └───────────────────┬───────────────────┘
//!                                ▼ transport (cancellable)
//!            ┌──────────── response phase ───────────┐
//!            │ release holder entry                  │
//!            │ 401, not bypass, retry available:     │
//!            │   ensure_fresh_token                  │
//!            │   ok ──────▶ resend once              │
//!            │   missing ─▶ guest logout, orig. 401  │
//!            │   other ───▶ full logout, Cancelled   │
//!            └───────────────────────────────────────┘
//! ```
//!
//! Every cancellation, whatever its source, surfaces as
//! [`ClientError::Cancelled`].

use std::future::Future;

use storefront_auth::{RefreshFailure, SessionStore};
use storefront_core::{ApiRequest, RequestId, canonicalize, resolve_url};
use tokio_util::sync::CancellationToken;

use crate::client::ClientInner;
use crate::error::{CancelReason, ClientError, Result};
use crate::logout::LogoutMode;
use crate::registry::PendingRegistry;
use crate::transport::ApiResponse;

/// One registered request travelling through the pipeline.
pub(crate) struct InFlight {
    pub(crate) id: RequestId,
    pub(crate) url: String,
    pub(crate) request: ApiRequest,
    pub(crate) token: CancellationToken,
    pub(crate) bypass: bool,
}

impl InFlight {
    fn attach_bearer(&mut self, session: &dyn SessionStore) {
        self.request.set_bearer(session.access_token().as_deref());
    }
}

/// Settles the registry entry of a request however its future ends,
/// including when the caller drops it.
pub(crate) struct SettleGuard<'a> {
    registry: &'a PendingRegistry,
    id: RequestId,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.registry.finish(self.id);
    }
}

impl ClientInner {
    /// Normalizes the request and makes it the holder of its canonical key,
    /// cancelling any earlier request with the same key.
    pub(crate) fn register(
        &self,
        mut request: ApiRequest,
        external: Option<&CancellationToken>,
    ) -> InFlight {
        request.normalize_content_type();
        let key = canonicalize(&request, &self.base_url);
        let url = resolve_url(&self.base_url, request.url());
        let id = RequestId::generate();
        let token = external.map_or_else(CancellationToken::new, CancellationToken::child_token);
        let bypass = self.bypass.matches(&url);

        self.registry.register(key.clone(), id, token.clone());
        tracing::debug!(request_id = %id, key = %key, bypass, "Request registered");

        InFlight {
            id,
            url,
            request,
            token,
            bypass,
        }
    }

    pub(crate) fn settle_guard(&self, id: RequestId) -> SettleGuard<'_> {
        SettleGuard {
            registry: &self.registry,
            id,
        }
    }

    /// Request phase, transport, response phase.
    pub(crate) async fn run(&self, call: &mut InFlight) -> Result<ApiResponse> {
        self.intercept_request(call).await?;
        let outcome = self.dispatch(call).await;
        self.intercept_response(call, outcome).await
    }

    async fn intercept_request(&self, call: &mut InFlight) -> Result<()> {
        if call.bypass {
            return Ok(());
        }

        match self.guarded(call, self.lifecycle.ensure_fresh_token()).await? {
            Ok(()) => {
                call.attach_bearer(self.lifecycle.session().as_ref());
                Ok(())
            }
            Err(RefreshFailure::Missing) => {
                tracing::debug!(request_id = %call.id, "No refresh cookie; continuing as guest");
                self.logout.logout(LogoutMode::Guest).await;
                call.request.set_bearer(None);
                Ok(())
            }
            Err(failure) => {
                tracing::warn!(
                    request_id = %call.id,
                    code = failure.code(),
                    "Token refresh failed before request; logging out"
                );
                self.logout.logout(LogoutMode::Full).await;
                Err(ClientError::cancelled(CancelReason::AuthFailed))
            }
        }
    }

    async fn dispatch(&self, call: &InFlight) -> Result<ApiResponse> {
        self.guarded(call, self.transport.send(&call.url, &call.request))
            .await?
            .and_then(ApiResponse::error_for_status)
    }

    async fn intercept_response(
        &self,
        call: &mut InFlight,
        outcome: Result<ApiResponse>,
    ) -> Result<ApiResponse> {
        self.registry.release(call.id);

        let err = match outcome {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };
        if !err.is_unauthorized() || call.bypass || !self.registry.begin_retry(call.id) {
            return Err(err);
        }

        if let Some(rejected) = call.request.bearer() {
            self.lifecycle.invalidate(rejected);
        }

        match self.guarded(call, self.lifecycle.ensure_fresh_token()).await? {
            Ok(()) => {
                call.attach_bearer(self.lifecycle.session().as_ref());
                tracing::debug!(request_id = %call.id, "Retrying request after 401");
                self.dispatch(call).await
            }
            Err(RefreshFailure::Missing) => {
                self.logout.logout(LogoutMode::Guest).await;
                Err(err)
            }
            Err(failure) => {
                tracing::warn!(
                    request_id = %call.id,
                    code = failure.code(),
                    "Token refresh failed after 401; logging out"
                );
                self.logout.logout(LogoutMode::Full).await;
                Err(ClientError::cancelled(CancelReason::AuthFailed))
            }
        }
    }

    /// Runs `fut` unless the request is cancelled first.
    async fn guarded<F: Future>(&self, call: &InFlight, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = call.token.cancelled() => Err(self.cancellation(call.id)),
            output = fut => Ok(output),
        }
    }

    fn cancellation(&self, id: RequestId) -> ClientError {
        let reason = self
            .registry
            .cancel_reason(id)
            .unwrap_or(CancelReason::External);
        tracing::debug!(request_id = %id, %reason, "Request cancelled");
        ClientError::cancelled(reason)
    }
}
