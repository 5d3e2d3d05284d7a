//! # storefront-catalog
//!
//! Windowed access to the paginated product catalog.
//!
//! ## Modules
//!
//! - [`filter`] - Catalog filters, their signatures and query parameters
//! - [`page`] - List endpoint response shape
//! - [`source`] - Page fetching seam and its HTTP implementation
//! - [`notify`] - User-facing failure notifications
//! - [`cache`] - The windowed page cache

pub mod cache;
pub mod filter;
pub mod notify;
pub mod page;
pub mod source;

pub use cache::{PageCacheConfig, PageLoad, WindowedPageCache};
pub use filter::{CatalogFilter, FilterSignature, SortMode};
pub use notify::{Notifier, TracingNotifier};
pub use page::PageResponse;
pub use source::{HttpPageSource, PageSource};
