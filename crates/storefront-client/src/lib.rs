//! Storefront request pipeline.
//!
//! [`ApiClient`] wraps every outbound call in a request and a response
//! phase:
//!
//! - **Deduplication**: requests are keyed by their canonical form. Issuing a
//!   request whose key matches one still in flight cancels the older one;
//!   the latest request for a given key wins.
//! - **Token refresh**: before each call the access token is refreshed if it
//!   is stale (single-flight, with a failure cooldown). A 401 is retried once
//!   with a refreshed token.
//! - **Guest fallback**: when there is no refresh cookie the session is
//!   dropped locally and the request continues anonymously. Any other refresh
//!   failure logs the user out and cancels the request.
//!
//! Auth endpoints themselves (refresh, logout, guest bootstrap) bypass token
//! handling.
//!
//! # Example
//!
//! ```ignore
//! use storefront_client::{ApiClient, config::loader};
//! use storefront_core::ApiRequest;
//!
//! let config = loader::load_config(None)?;
//! let client = ApiClient::builder(config).build()?;
//! let product: serde_json::Value = client
//!     .execute_json(ApiRequest::get("/products/42"))
//!     .await?;
//! ```

pub mod bypass;
pub mod client;
pub mod config;
pub mod error;
mod interceptor;
pub mod logout;
pub mod observability;
pub mod registry;
pub mod retry;
pub mod transport;

pub use bypass::BypassRoutes;
pub use client::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use error::{CancelReason, ClientError, Result};
pub use logout::{LogoutCoordinator, LogoutMode};
pub use registry::{PendingRegistry, RequestMetadata};
pub use retry::RetryState;
pub use transport::{ApiResponse, HttpTransport, ReqwestTransport, build_http_client};

pub use tokio_util::sync::CancellationToken;
