use anyhow::{Result, bail};
use serde_json::Value;
use storefront_client::ApiClient;
use storefront_core::ApiRequest;

use crate::cli::KeyArgs;

pub fn key(client: &ApiClient, args: &KeyArgs) -> Result<()> {
    let request = build_request(args)?;
    println!("{}", client.canonical_key(&request));
    Ok(())
}

fn build_request(args: &KeyArgs) -> Result<ApiRequest> {
    let path = args.path.as_str();
    let mut request = match args.method.to_ascii_uppercase().as_str() {
        "GET" => ApiRequest::get(path),
        "POST" => ApiRequest::post(path),
        "PUT" => ApiRequest::put(path),
        "PATCH" => ApiRequest::patch(path),
        "DELETE" => ApiRequest::delete(path),
        other => bail!("Unsupported method: {other}"),
    };
    for (k, v) in &args.query {
        request = request.query(k.as_str(), v);
    }
    if let Some(raw) = &args.body {
        let body: Value = serde_json::from_str(raw)?;
        request = request.json(&body)?;
    }
    Ok(request)
}
