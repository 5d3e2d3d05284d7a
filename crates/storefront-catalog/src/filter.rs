//! Catalog filters and their signatures.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordering / status discriminator understood by the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    BestSelling,
    OnSale,
}

impl SortMode {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Newest => "NEWEST",
            Self::PriceAsc => "PRICE_ASC",
            Self::PriceDesc => "PRICE_DESC",
            Self::BestSelling => "BEST_SELLING",
            Self::OnSale => "ON_SALE",
        }
    }
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "newest" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "best_selling" => Ok(Self::BestSelling),
            "on_sale" => Ok(Self::OnSale),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// Current catalog query.
///
/// Selections are sets: their order never matters. `initial_page` is the
/// page a deep link points at; it is not part of the [`FilterSignature`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogFilter {
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub categories: BTreeSet<u64>,
    pub sizes: BTreeSet<String>,
    pub colors: BTreeSet<String>,
    pub sort: SortMode,
    pub initial_page: u32,
}

impl CatalogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_price_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    #[must_use]
    pub fn with_categories(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.categories = ids.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_sizes<S: Into<String>>(mut self, sizes: impl IntoIterator<Item = S>) -> Self {
        self.sizes = sizes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_colors<S: Into<String>>(mut self, colors: impl IntoIterator<Item = S>) -> Self {
        self.colors = colors.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_initial_page(mut self, page: u32) -> Self {
        self.initial_page = page;
        self
    }

    /// Selections are JSON-encoded so values containing separators cannot
    /// collide.
    pub fn signature(&self) -> FilterSignature {
        let price = |bound: Option<u64>| bound.map(|p| p.to_string()).unwrap_or_default();

        FilterSignature(format!(
            "min={}|max={}|cat={}|size={}|color={}|sort={}",
            price(self.min_price),
            price(self.max_price),
            encode_set(&self.categories),
            encode_set(&self.sizes),
            encode_set(&self.colors),
            self.sort.as_param(),
        ))
    }

    /// Query parameters for one page of this filter. Multi-valued filters
    /// repeat their key.
    pub fn to_query(&self, page: u32, page_size: u32) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(min) = self.min_price {
            query.push(("minPrice".to_string(), min.to_string()));
        }
        if let Some(max) = self.max_price {
            query.push(("maxPrice".to_string(), max.to_string()));
        }
        query.extend(
            self.categories
                .iter()
                .map(|id| ("categoryIds".to_string(), id.to_string())),
        );
        query.extend(self.sizes.iter().map(|s| ("sizes".to_string(), s.clone())));
        query.extend(self.colors.iter().map(|c| ("colors".to_string(), c.clone())));
        query.push(("status".to_string(), self.sort.as_param().to_string()));
        query.push(("page".to_string(), page.to_string()));
        query.push(("size".to_string(), page_size.to_string()));
        query
    }
}

fn encode_set<T: Serialize>(values: &BTreeSet<T>) -> String {
    serde_json::to_string(values).unwrap_or_default()
}

/// Deterministic encoding of everything that selects catalog content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterSignature(String);

impl FilterSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
