use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::Value;
use storefront_catalog::{
    CatalogFilter, HttpPageSource, PageCacheConfig, TracingNotifier, WindowedPageCache,
};
use storefront_client::ApiClient;
use storefront_client::config::CatalogSettings;
use storefront_core::system_clock;

use crate::cli::{BrowseArgs, OutputFormat};
use crate::output::{print_items, print_notice};

pub async fn browse(
    client: ApiClient,
    settings: &CatalogSettings,
    args: &BrowseArgs,
    format: OutputFormat,
) -> Result<()> {
    let config = PageCacheConfig::from(settings);
    let page_size = u64::from(config.page_size);
    let to = viewport_end(args.from, args.to, page_size);

    let filter = filter_from_args(args, page_size);
    let source = Arc::new(HttpPageSource::new(client, settings.list_path.clone()));
    let cache: WindowedPageCache<Value> = WindowedPageCache::new(
        source,
        Arc::new(TracingNotifier),
        system_clock(),
        config,
        filter,
    );

    cache.load_initial().await;
    cache.ensure_around(args.from, to).await;

    if cache.loaded_pages().is_empty() {
        bail!("No catalog page could be loaded");
    }

    let total = cache.total_count();
    let end = to.min(total.saturating_sub(1));
    let items: Vec<(u64, Value)> = (args.from..=end)
        .filter_map(|index| cache.item_at(index).map(|item| (index, item)))
        .collect();
    let expected = end.saturating_add(1).saturating_sub(args.from);
    if total > 0 && (items.len() as u64) < expected {
        print_notice(&format!(
            "{} of {} items in range could not be loaded",
            expected - items.len() as u64,
            expected
        ));
    }

    print_items(&items, total, format);
    Ok(())
}

/// Last item index to show: `to`, or one page from `from`.
fn viewport_end(from: u64, to: Option<u64>, page_size: u64) -> u64 {
    to.unwrap_or_else(|| from.saturating_add(page_size.saturating_sub(1)))
        .max(from)
}

fn filter_from_args(args: &BrowseArgs, page_size: u64) -> CatalogFilter {
    let initial_page = u32::try_from(args.from / page_size).unwrap_or(u32::MAX);
    CatalogFilter::new()
        .with_price_range(args.min_price, args.max_price)
        .with_categories(args.categories.iter().copied())
        .with_sizes(args.sizes.iter().cloned())
        .with_colors(args.colors.iter().cloned())
        .with_sort(args.sort)
        .with_initial_page(initial_page)
}
