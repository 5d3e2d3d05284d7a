//! Windowed page cache.
//!
//! Turns the paginated list endpoint into a randomly addressable sequence
//! for a virtualized list. All state belongs to one *generation*, created
//! for a [`FilterSignature`] and discarded in full when the signature
//! changes.
//!
//! ## Per-generation state
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `pages` | page index to items, only after the page was received |
//! | `requested` | pages loaded, in flight, or known not to exist |
//! | `in_flight` | pages with a fetch outstanding |
//! | `failed_until` | per-page failure cooldown |
//! | `known_last_page` | set by a terminal page; nothing beyond it is fetched |
//! | `total_count` | final once derived from the terminal page |
//!
//! Each generation owns a cancellation token handed to its fetches. A filter
//! change cancels it, and results tagged with an older generation are
//! dropped without touching the current one.
//!
//! Readers ([`item_at`](WindowedPageCache::item_at),
//! [`total_count`](WindowedPageCache::total_count)) take a read lock and
//! never mutate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use parking_lot::RwLock;
use storefront_client::ClientError;
use storefront_client::config::CatalogSettings;
use storefront_core::SharedClock;
use tokio_util::sync::CancellationToken;

use crate::filter::{CatalogFilter, FilterSignature};
use crate::notify::Notifier;
use crate::page::PageResponse;
use crate::source::PageSource;

/// Tuning for the page cache.
#[derive(Debug, Clone)]
pub struct PageCacheConfig {
    /// Items per page (default: 24).
    pub page_size: u32,

    /// How long a failed page is left alone before it may be fetched again
    /// (default: 5 seconds).
    pub failure_cooldown: Duration,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self {
            page_size: 24,
            failure_cooldown: Duration::from_secs(5),
        }
    }
}

impl PageCacheConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size. Zero is treated as one.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown = cooldown;
        self
    }
}

impl From<&CatalogSettings> for PageCacheConfig {
    fn from(settings: &CatalogSettings) -> Self {
        Self::new()
            .with_page_size(settings.page_size)
            .with_failure_cooldown(settings.failure_cooldown())
    }
}

/// Outcome of one `ensure_page` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoad {
    /// Nothing to do: out of range, known, in flight or cooling down.
    Skipped,
    Loaded,
    /// The fetch failed; the page is cooling down and the user was notified.
    Failed,
    /// The fetch was cancelled; the page may be requested again at once.
    Cancelled,
    /// The filter changed, or a terminal page arrived, while the page was in
    /// flight; result dropped.
    Discarded,
}

struct Generation<T> {
    id: u64,
    filter: CatalogFilter,
    signature: FilterSignature,
    cancel: CancellationToken,
    pages: HashMap<u32, Arc<Vec<T>>>,
    requested: HashSet<u32>,
    in_flight: HashSet<u32>,
    failed_until: HashMap<u32, Instant>,
    known_last_page: Option<u32>,
    total_count: Option<u64>,
    total_is_final: bool,
}

impl<T> Generation<T> {
    fn new(id: u64, filter: CatalogFilter) -> Self {
        Self {
            id,
            signature: filter.signature(),
            filter,
            cancel: CancellationToken::new(),
            pages: HashMap::new(),
            requested: HashSet::new(),
            in_flight: HashSet::new(),
            failed_until: HashMap::new(),
            known_last_page: None,
            total_count: None,
            total_is_final: false,
        }
    }

    fn beyond_last(&self, page: u32) -> bool {
        self.known_last_page.is_some_and(|last| page > last)
    }

    fn should_fetch(&self, page: u32, now: Instant) -> bool {
        !self.beyond_last(page)
            && !self.requested.contains(&page)
            && !self.in_flight.contains(&page)
            && self.failed_until.get(&page).is_none_or(|until| now >= *until)
    }

    /// Freezes `last` as the final page and derives the total from it.
    fn mark_last(&mut self, last: u32, page_size: u32) {
        let last = self.known_last_page.map_or(last, |known| known.min(last));
        self.known_last_page = Some(last);
        self.pages.retain(|page, _| *page <= last);
        self.requested.insert(last.saturating_add(1));

        let tail = self
            .pages
            .get(&last)
            .map_or(u64::from(page_size), |items| items.len() as u64);
        self.total_count = Some(u64::from(last) * u64::from(page_size) + tail);
        self.total_is_final = true;
    }
}

pub struct WindowedPageCache<T> {
    source: Arc<dyn PageSource<T>>,
    notifier: Arc<dyn Notifier>,
    clock: SharedClock,
    config: PageCacheConfig,
    state: RwLock<Generation<T>>,
    generations: AtomicU64,
}

impl<T> WindowedPageCache<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates an empty cache for `filter`. Nothing is fetched until
    /// [`load_initial`](Self::load_initial) or an `ensure_*` call.
    pub fn new(
        source: Arc<dyn PageSource<T>>,
        notifier: Arc<dyn Notifier>,
        clock: SharedClock,
        config: PageCacheConfig,
        filter: CatalogFilter,
    ) -> Self {
        Self {
            source,
            notifier,
            clock,
            config,
            state: RwLock::new(Generation::new(0, filter)),
            generations: AtomicU64::new(0),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.config.page_size.max(1)
    }

    /// Installs `filter`. A new signature discards every cached page and
    /// cancels fetches still running for the old one; the same signature
    /// only updates the deep-link page. Returns whether the cache was reset.
    pub fn reset(&self, filter: CatalogFilter) -> bool {
        let mut state = self.state.write();
        if state.signature == filter.signature() {
            state.filter.initial_page = filter.initial_page;
            return false;
        }

        state.cancel.cancel();
        let id = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let next = Generation::new(id, filter);
        tracing::debug!(
            generation = id,
            from = %state.signature,
            to = %next.signature,
            "Catalog filter changed; discarding cached pages"
        );
        *state = next;
        true
    }

    /// [`reset`](Self::reset) followed by a load of the filter's initial page.
    pub async fn set_filter(&self, filter: CatalogFilter) -> PageLoad {
        self.reset(filter);
        self.load_initial().await
    }

    pub async fn load_initial(&self) -> PageLoad {
        let initial = self.state.read().filter.initial_page;
        self.ensure_page(i64::from(initial)).await
    }

    /// Fetches `page` unless it is negative, beyond the known last page,
    /// already requested or loaded, in flight, or cooling down after a
    /// failure.
    pub async fn ensure_page(&self, page: i64) -> PageLoad {
        let Ok(page) = u32::try_from(page) else {
            return PageLoad::Skipped;
        };

        let (generation, filter, cancel) = {
            let mut state = self.state.write();
            if !state.should_fetch(page, self.clock.now()) {
                return PageLoad::Skipped;
            }
            state.requested.insert(page);
            state.in_flight.insert(page);
            (state.id, state.filter.clone(), state.cancel.clone())
        };

        tracing::debug!(page, generation, "Fetching catalog page");
        let outcome = self
            .source
            .fetch_page(&filter, page, self.page_size(), &cancel)
            .await;
        self.apply(generation, page, outcome)
    }

    /// Fetches `page` again even though it is loaded. Items stay visible
    /// meanwhile and are only replaced if the content changed.
    pub async fn reload_page(&self, page: u32) -> PageLoad {
        {
            let mut state = self.state.write();
            if state.beyond_last(page) || state.in_flight.contains(&page) {
                return PageLoad::Skipped;
            }
            state.requested.remove(&page);
            state.failed_until.remove(&page);
        }
        self.ensure_page(i64::from(page)).await
    }

    /// Ensures every page covering item indices `start..=end`, plus one page
    /// before it, bounded by the known last page. Pages are fetched
    /// concurrently. Returns how many pages were loaded.
    pub async fn ensure_around(&self, start: u64, end: u64) -> usize {
        let pages: Vec<u32> = {
            let state = self.state.read();
            self.page_range(start, end, state.known_last_page)
                .filter(|page| !state.requested.contains(page) && !state.in_flight.contains(page))
                .collect()
        };
        if pages.is_empty() {
            return 0;
        }

        let loads = join_all(pages.into_iter().map(|page| self.ensure_page(i64::from(page)))).await;
        loads.into_iter().filter(|l| *l == PageLoad::Loaded).count()
    }

    fn page_range(
        &self,
        start: u64,
        end: u64,
        known_last: Option<u32>,
    ) -> std::ops::RangeInclusive<u32> {
        let size = u64::from(self.page_size());
        let (start, end) = (start.min(end), start.max(end));
        let clamp = |page: u64| u32::try_from(page).unwrap_or(u32::MAX);

        let first = clamp(start / size).saturating_sub(1);
        let last = clamp(end / size);
        let last = known_last.map_or(last, |known| last.min(known));
        first..=last
    }

    /// Item at `index`, or `None` while its page is not loaded.
    pub fn item_at(&self, index: u64) -> Option<T> {
        let size = u64::from(self.page_size());
        let page = u32::try_from(index / size).ok()?;
        let offset = usize::try_from(index % size).ok()?;
        self.state.read().pages.get(&page)?.get(offset).cloned()
    }

    pub fn page(&self, page: u32) -> Option<Arc<Vec<T>>> {
        self.state.read().pages.get(&page).cloned()
    }

    /// Item count to lay the list out with.
    ///
    /// Final once the terminal page is known. Before that it covers at least
    /// every loaded item and, while the initial page is missing, enough slots
    /// to scroll to it.
    pub fn total_count(&self) -> u64 {
        let state = self.state.read();
        if state.total_is_final {
            return state.total_count.unwrap_or(0);
        }

        let size = u64::from(self.page_size());
        let target = state.filter.initial_page;
        let placeholder = if state.pages.contains_key(&target) {
            0
        } else {
            (u64::from(target) + 1) * size
        };
        let loaded = state
            .pages
            .iter()
            .map(|(page, items)| u64::from(*page) * size + items.len() as u64)
            .max()
            .unwrap_or(0);

        state.total_count.unwrap_or(0).max(placeholder).max(loaded)
    }

    /// Total reported by the server or derived from the terminal page.
    pub fn known_total(&self) -> Option<u64> {
        self.state.read().total_count
    }

    pub fn known_last_page(&self) -> Option<u32> {
        self.state.read().known_last_page
    }

    pub fn is_loading(&self) -> bool {
        !self.state.read().in_flight.is_empty()
    }

    pub fn is_page_loading(&self, page: u32) -> bool {
        self.state.read().in_flight.contains(&page)
    }

    pub fn loaded_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.state.read().pages.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    pub fn signature(&self) -> FilterSignature {
        self.state.read().signature.clone()
    }

    pub fn current_filter(&self) -> CatalogFilter {
        self.state.read().filter.clone()
    }

    fn apply(
        &self,
        generation: u64,
        page: u32,
        outcome: Result<PageResponse<T>, ClientError>,
    ) -> PageLoad {
        let mut state = self.state.write();
        if state.id != generation {
            tracing::debug!(page, generation, "Dropping page fetched for a previous filter");
            return PageLoad::Discarded;
        }
        state.in_flight.remove(&page);
        if state.beyond_last(page) {
            tracing::debug!(page, "Dropping page beyond the known last page");
            return PageLoad::Discarded;
        }

        match outcome {
            Ok(response) => {
                self.store(&mut state, page, response);
                PageLoad::Loaded
            }
            Err(err) if err.is_cancellation() => {
                state.requested.remove(&page);
                tracing::debug!(page, "Catalog page fetch cancelled");
                PageLoad::Cancelled
            }
            Err(err) => {
                state.requested.remove(&page);
                let until = self.clock.now() + self.config.failure_cooldown;
                state.failed_until.insert(page, until);
                let signature = state.signature.clone();
                drop(state);

                tracing::warn!(page, signature = %signature, error = %err, "Catalog page fetch failed");
                self.notifier
                    .error(&format!("Could not load products (page {}).", u64::from(page) + 1));
                PageLoad::Failed
            }
        }
    }

    fn store(&self, state: &mut Generation<T>, page: u32, response: PageResponse<T>) {
        let PageResponse {
            content,
            last,
            total_elements,
            ..
        } = response;
        state.failed_until.remove(&page);

        if !last && content.is_empty() && page > 0 {
            tracing::debug!(page, "Empty page without terminal flag; previous page is last");
            state.mark_last(page - 1, self.page_size());
            return;
        }

        let changed = state
            .pages
            .get(&page)
            .is_none_or(|existing| existing.as_slice() != content.as_slice());
        if changed {
            state.pages.insert(page, Arc::new(content));
        }

        if last {
            state.mark_last(page, self.page_size());
        } else if let (false, Some(total)) = (state.total_is_final, total_elements) {
            state.total_count = Some(total);
        }
    }
}
