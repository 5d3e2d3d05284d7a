use anyhow::Result;
use serde_json::Value;
use storefront_client::ApiClient;
use storefront_core::ApiRequest;

use crate::cli::OutputFormat;
use crate::output::print_value;

pub async fn get(
    client: &ApiClient,
    path: &str,
    query: &[(String, String)],
    format: OutputFormat,
) -> Result<()> {
    let request = query
        .iter()
        .fold(ApiRequest::get(path), |req, (k, v)| req.query(k.as_str(), v));
    let value: Value = client.execute_json(request).await?;
    print_value(&value, format);
    Ok(())
}
