//! Pending-request registry.
//!
//! Two maps, both keyed for concurrent access:
//!
//! | Map | Key | Value |
//! |-----|-----|-------|
//! | holders | [`CanonicalKey`] | the request currently allowed to run for that key |
//! | requests | [`RequestId`] | key, cancellation token and [`RetryState`] of one live request |
//!
//! Registering under an occupied key cancels the previous holder before the
//! new one takes its place, under the same shard lock. Releasing only removes
//! the holder entry when it still belongs to the releasing request, so a
//! superseded request settling late never evicts its replacement.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use storefront_core::{CanonicalKey, RequestId};
use tokio_util::sync::CancellationToken;

use crate::error::CancelReason;
use crate::retry::RetryState;

#[derive(Debug)]
struct Holder {
    request_id: RequestId,
    token: CancellationToken,
}

/// Side-table entry for one live request.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub key: CanonicalKey,
    pub token: CancellationToken,
    pub retry: RetryState,
    /// Set when the registry itself cancelled the request.
    pub cancelled: Option<CancelReason>,
}

#[derive(Debug, Default)]
pub struct PendingRegistry {
    holders: DashMap<CanonicalKey, Holder>,
    requests: DashMap<RequestId, RequestMetadata>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `request_id` the holder of `key`, cancelling whoever held it.
    /// Returns whether a previous holder was superseded.
    pub fn register(
        &self,
        key: CanonicalKey,
        request_id: RequestId,
        token: CancellationToken,
    ) -> bool {
        // Metadata row first: a concurrent supersede must find it.
        self.requests.insert(
            request_id,
            RequestMetadata {
                key: key.clone(),
                token: token.clone(),
                retry: RetryState::NotRetried,
                cancelled: None,
            },
        );

        let holder = Holder { request_id, token };
        match self.holders.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get();
                tracing::debug!(
                    key = %key,
                    previous = %previous.request_id,
                    current = %request_id,
                    "Superseding in-flight request"
                );
                self.mark_cancelled(previous.request_id, CancelReason::Superseded);
                previous.token.cancel();
                entry.insert(holder);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(holder);
                false
            }
        }
    }

    fn mark_cancelled(&self, request_id: RequestId, reason: CancelReason) {
        if let Some(mut metadata) = self.requests.get_mut(&request_id) {
            metadata.cancelled.get_or_insert(reason);
        }
    }

    /// Why the registry cancelled `request_id`, if it did.
    pub fn cancel_reason(&self, request_id: RequestId) -> Option<CancelReason> {
        self.requests.get(&request_id).and_then(|m| m.cancelled)
    }

    /// Drops the holder entry if `request_id` still owns it.
    pub fn release(&self, request_id: RequestId) -> bool {
        let Some(key) = self.requests.get(&request_id).map(|m| m.key.clone()) else {
            return false;
        };
        self.holders
            .remove_if(&key, |_, holder| holder.request_id == request_id)
            .is_some()
    }

    /// Whether `request_id` is still the holder of its key.
    pub fn is_current(&self, request_id: RequestId) -> bool {
        let Some(key) = self.requests.get(&request_id).map(|m| m.key.clone()) else {
            return false;
        };
        self.holders
            .get(&key)
            .is_some_and(|holder| holder.request_id == request_id)
    }

    /// Spends the request's single retry. False when already spent, settled
    /// or unknown.
    pub fn begin_retry(&self, request_id: RequestId) -> bool {
        self.requests
            .get_mut(&request_id)
            .is_some_and(|mut metadata| metadata.retry.begin_retry())
    }

    pub fn retry_state(&self, request_id: RequestId) -> Option<RetryState> {
        self.requests.get(&request_id).map(|m| m.retry)
    }

    /// Settles the request: releases its holder entry and forgets its metadata.
    pub fn finish(&self, request_id: RequestId) {
        self.release(request_id);
        if let Some((_, mut metadata)) = self.requests.remove(&request_id) {
            metadata.retry.terminate();
        }
    }

    /// Cancels every pending request. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        self.holders.retain(|_, holder| {
            holder.token.cancel();
            cancelled += 1;
            false
        });
        for mut entry in self.requests.iter_mut() {
            entry.cancelled.get_or_insert(CancelReason::Logout);
            entry.token.cancel();
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled all pending requests");
        }
        cancelled
    }

    /// Number of keys with a request in flight.
    pub fn pending(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty() && self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{ApiRequest, canonicalize};

    fn key(path: &str) -> CanonicalKey {
        canonicalize(&ApiRequest::get(path), "https://shop.example.com/api")
    }

    #[test]
    fn test_register_supersedes_previous_holder() {
        let registry = PendingRegistry::new();
        let first = (RequestId::generate(), CancellationToken::new());
        let second = (RequestId::generate(), CancellationToken::new());

        assert!(!registry.register(key("/cart"), first.0, first.1.clone()));
        assert!(registry.register(key("/cart"), second.0, second.1.clone()));

        assert!(first.1.is_cancelled());
        assert!(!second.1.is_cancelled());
        assert_eq!(registry.cancel_reason(first.0), Some(CancelReason::Superseded));
        assert_eq!(registry.cancel_reason(second.0), None);
        assert!(!registry.is_current(first.0));
        assert!(registry.is_current(second.0));
        assert_eq!(registry.pending(), 1);
    }

    #[test]
    fn test_concurrent_registrations_all_report_superseded() {
        let registry = PendingRegistry::new();
        let ids: Vec<RequestId> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..50)
                            .map(|_| {
                                let id = RequestId::generate();
                                registry.register(key("/cart"), id, CancellationToken::new());
                                id
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        let current: Vec<_> = ids.iter().filter(|id| registry.is_current(**id)).collect();
        assert_eq!(current.len(), 1);
        for id in &ids {
            let expected = (!registry.is_current(*id)).then_some(CancelReason::Superseded);
            assert_eq!(registry.cancel_reason(*id), expected);
        }
    }

    #[test]
    fn test_distinct_keys_do_not_interfere() {
        let registry = PendingRegistry::new();
        let a = CancellationToken::new();
        let b = CancellationToken::new();

        registry.register(key("/cart"), RequestId::generate(), a.clone());
        registry.register(key("/wishlist"), RequestId::generate(), b.clone());

        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());
        assert_eq!(registry.pending(), 2);
    }

    #[test]
    fn test_late_release_keeps_replacement() {
        let registry = PendingRegistry::new();
        let old = RequestId::generate();
        let new = RequestId::generate();

        registry.register(key("/cart"), old, CancellationToken::new());
        registry.register(key("/cart"), new, CancellationToken::new());

        assert!(!registry.release(old));
        registry.finish(old);
        assert!(registry.is_current(new));

        registry.finish(new);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_retry_is_spent_once_per_request() {
        let registry = PendingRegistry::new();
        let id = RequestId::generate();
        registry.register(key("/orders"), id, CancellationToken::new());

        assert_eq!(registry.retry_state(id), Some(RetryState::NotRetried));
        assert!(registry.begin_retry(id));
        assert!(!registry.begin_retry(id));
        assert_eq!(registry.retry_state(id), Some(RetryState::Retried));

        registry.finish(id);
        assert!(!registry.begin_retry(id));
        assert_eq!(registry.retry_state(id), None);
    }

    #[test]
    fn test_cancel_all() {
        let registry = PendingRegistry::new();
        let tokens: Vec<_> = (0..3).map(|_| CancellationToken::new()).collect();
        for (i, token) in tokens.iter().enumerate() {
            registry.register(key(&format!("/p/{i}")), RequestId::generate(), token.clone());
        }

        let retried = RequestId::generate();
        let retried_token = CancellationToken::new();
        registry.register(key("/orders"), retried, retried_token.clone());
        registry.release(retried);

        assert_eq!(registry.cancel_all(), 3);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(retried_token.is_cancelled());
        assert_eq!(registry.cancel_reason(retried), Some(CancelReason::Logout));
        assert_eq!(registry.pending(), 0);
    }
}
