use serde::{Deserialize, Serialize};

/// One page of the catalog list endpoint.
///
/// `totalElements` is optional; some deployments send `total` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub last: bool,
    #[serde(default, alias = "total")]
    pub total_elements: Option<u64>,
    #[serde(default)]
    pub number: Option<u32>,
}

impl<T> PageResponse<T> {
    pub fn new(content: Vec<T>, last: bool) -> Self {
        Self {
            content,
            last,
            total_elements: None,
            number: None,
        }
    }

    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total_elements = Some(total);
        self
    }
}
