//! Where pages come from.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use storefront_client::{ApiClient, ClientError};
use storefront_core::ApiRequest;
use tokio_util::sync::CancellationToken;

use crate::filter::CatalogFilter;
use crate::page::PageResponse;

#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetches one page. Must give up with a cancellation error once
    /// `cancel` fires.
    async fn fetch_page(
        &self,
        filter: &CatalogFilter,
        page: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResponse<T>, ClientError>;
}

/// Catalog list endpoint reached through the request pipeline.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: ApiClient,
    list_path: String,
}

impl HttpPageSource {
    pub fn new(client: ApiClient, list_path: impl Into<String>) -> Self {
        Self {
            client,
            list_path: list_path.into(),
        }
    }

    pub fn request(&self, filter: &CatalogFilter, page: u32, page_size: u32) -> ApiRequest {
        filter
            .to_query(page, page_size)
            .into_iter()
            .fold(ApiRequest::get(self.list_path.clone()), |req, (k, v)| {
                req.query(k, v)
            })
    }
}

#[async_trait]
impl<T> PageSource<T> for HttpPageSource
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(
        &self,
        filter: &CatalogFilter,
        page: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<PageResponse<T>, ClientError> {
        let request = self.request(filter, page, page_size);
        self.client.execute_json_cancellable(request, cancel).await
    }
}
