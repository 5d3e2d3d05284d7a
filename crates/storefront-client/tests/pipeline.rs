use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use storefront_auth::{MemorySessionStore, SessionStore};
use storefront_client::{ApiClient, CancelReason, CancellationToken, ClientConfig, ClientError};
use storefront_core::{ApiRequest, FormPart, ManualClock};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = format!("{}/api", server.uri());
    config
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::builder(config(server)).build().unwrap()
}

/// Client whose user is signed in with an already expired token.
fn client_with_expired_token(server: &MockServer) -> (ApiClient, Arc<MemorySessionStore>) {
    let session = Arc::new(MemorySessionStore::signed_in("old", Instant::now()));
    let client = ApiClient::builder(config(server))
        .with_session(session.clone())
        .build()
        .unwrap();
    (client, session)
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_logout(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected)
        .mount(server)
        .await;
}

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "accessToken": token,
        "accessTokenExpiresIn": 600
    }))
}

#[tokio::test]
async fn newer_request_supersedes_older_one_with_same_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"content": []}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    let client = client(&server);

    let first = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .execute(ApiRequest::get("/products").query("page", 0).query("size", 24))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.pending_requests(), 1);

    // Same request, parameters in a different order.
    let second = client
        .execute(ApiRequest::get("/products").query("size", 24).query("page", 0))
        .await;

    let first = first.await.unwrap();
    assert_eq!(
        first.unwrap_err().cancel_reason(),
        Some(CancelReason::Superseded)
    );
    assert!(second.unwrap().status().is_success());
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn requests_with_different_keys_run_side_by_side() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(2)
        .mount(&server)
        .await;
    let client = client(&server);

    let (a, b) = tokio::join!(
        client.execute(ApiRequest::get("/products").query("page", 0)),
        client.execute(ApiRequest::get("/products").query("page", 1)),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn external_cancellation_is_reported_as_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    let client = client(&server);
    let cancel = CancellationToken::new();

    let pending = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            client
                .execute_cancellable(ApiRequest::get("/slow"), &cancel)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.cancel_reason(), Some(CancelReason::External));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn bearer_token_is_attached_when_signed_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server);
    client.sign_in("tok", Duration::from_secs(600));

    let orders: Vec<serde_json::Value> = client
        .execute_json(ApiRequest::get("/orders"))
        .await
        .unwrap();
    assert_eq!(orders, vec![json!({"id": 1})]);
}

#[tokio::test]
async fn stale_token_is_refreshed_before_the_request() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_response("new"), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let (client, session) = client_with_expired_token(&server);

    client.execute(ApiRequest::get("/orders")).await.unwrap();
    assert_eq!(session.access_token().as_deref(), Some("new"));
}

#[tokio::test]
async fn token_is_refreshed_once_the_clock_passes_its_expiry() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_response("second"), 1).await;
    for token in ["first", "second"] {
        Mock::given(method("GET"))
            .and(path("/api/orders"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }
    let clock = ManualClock::shared();
    let client = ApiClient::builder(config(&server))
        .with_clock(clock.clone())
        .build()
        .unwrap();
    client.sign_in("first", Duration::from_secs(120));

    client.execute(ApiRequest::get("/orders")).await.unwrap();
    // 120s lifetime minus the default 30s skew.
    clock.advance(Duration::from_secs(91));
    client.execute(ApiRequest::get("/orders")).await.unwrap();
}

#[tokio::test]
async fn unauthorized_response_is_retried_once_with_refreshed_token() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_response("new"), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server);
    client.sign_in("old", Duration::from_secs(600));

    let response = client.execute(ApiRequest::get("/orders")).await.unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn second_unauthorized_response_is_not_retried() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_response("new"), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
        .expect(2)
        .mount(&server)
        .await;
    let client = client(&server);
    client.sign_in("old", Duration::from_secs(600));

    let err = client.execute(ApiRequest::get("/orders")).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn missing_refresh_cookie_continues_as_guest() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({"message": "Refresh token missing"})),
        1,
    )
    .await;
    mount_logout(&server, 0).await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let (client, session) = client_with_expired_token(&server);

    client.execute(ApiRequest::get("/products")).await.unwrap();

    assert!(!session.is_authenticated());
    let requests = server.received_requests().await.unwrap();
    let product_request = requests
        .iter()
        .find(|r| r.url.path() == "/api/products")
        .unwrap();
    assert!(product_request.headers.get("authorization").is_none());
}

#[tokio::test]
async fn hard_refresh_failure_logs_out_and_cancels_before_network() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(500), 1).await;
    mount_logout(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (client, session) = client_with_expired_token(&server);

    let err = client.execute(ApiRequest::get("/orders")).await.unwrap_err();

    assert_eq!(err.cancel_reason(), Some(CancelReason::AuthFailed));
    assert!(!session.is_authenticated());
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn unauthorized_without_refresh_cookie_surfaces_original_error() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({"error": "no refresh cookie"})),
        1,
    )
    .await;
    mount_logout(&server, 0).await;
    Mock::given(method("GET"))
        .and(path("/api/wishlist"))
        .respond_with(ResponseTemplate::new(401).set_body_string("login required"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server);
    client.sign_in("old", Duration::from_secs(600));

    let err = client
        .execute(ApiRequest::get("/wishlist"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Http { status: 401, ref body } if body == "login required"));
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn bypass_routes_skip_refresh_and_retry() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_response("unused"), 0).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/guest"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let (client, session) = client_with_expired_token(&server);

    let err = client.bootstrap_guest_session().await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(session.is_authenticated());
    assert_eq!(client.lifecycle().refresh_calls(), 0);
}

#[tokio::test]
async fn logout_cancels_pending_requests() {
    let server = MockServer::start().await;
    mount_logout(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    let client = client(&server);
    client.sign_in("tok", Duration::from_secs(600));

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(ApiRequest::get("/cart")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.logout().await;

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.cancel_reason(), Some(CancelReason::Logout));
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn json_body_is_sent_with_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cart/items"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"productId": 7, "quantity": 2})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"items": 1})))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server);

    let request = ApiRequest::post("/cart/items")
        .json(&json!({"quantity": 2, "productId": 7}))
        .unwrap();
    let cart: serde_json::Value = client.execute_json(request).await.unwrap();
    assert_eq!(cart["items"], 1);
}

#[tokio::test]
async fn multipart_body_uses_transport_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server);

    let request = ApiRequest::post("/uploads")
        .header("content-type", "application/json")
        .unwrap()
        .multipart(vec![
            FormPart::text("title", "front"),
            FormPart::file("image", "front.png", "image/png", vec![0x89, 0x50]),
        ]);
    client.execute(request).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
}

#[tokio::test]
async fn server_errors_are_surfaced_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/cart/1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&server);

    let err = client
        .execute(ApiRequest::delete("/cart/1"))
        .await
        .unwrap_err();
    assert!(!err.is_cancellation());
    assert_eq!(err.status(), Some(503));
}
