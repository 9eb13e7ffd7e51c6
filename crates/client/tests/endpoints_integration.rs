//! Integration tests for the typed endpoint surface
//!
//! Exercise the full path from `EstationClient` methods through the
//! resilient HTTP client against a mock backend, including the session
//! credential lifecycle around login/logout/refresh.

use std::sync::Arc;
use std::time::Duration;

use estation_client::{EstationClient, EstationError, MemorySessionStore, SessionStore};
use estation_domain::{EstationConfig, HealthState, LoginCredentials, NewWorkspace};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer, store: Arc<MemorySessionStore>) -> EstationClient {
    let mut config = EstationConfig::default();
    config.api.base_url = server.uri();
    config.api.direct_url = server.uri();
    config.api.retry_backoff = Duration::from_millis(10);
    EstationClient::with_session_store(config, store).expect("client")
}

const KEY: &str = "estation_session";

#[tokio::test]
async fn login_stores_the_returned_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "ops", "password": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-abc",
            "user": {"id": 7, "name": "Ops User", "username": "ops", "email": "ops@example.org"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    let client = test_client(&server, store.clone());

    let response = client
        .login(&LoginCredentials { username: "ops".into(), password: "s3cret".into() })
        .await
        .expect("login");

    assert_eq!(response.user.username, "ops");
    assert_eq!(store.get(KEY).unwrap().as_deref(), Some("tok-abc"));
}

#[tokio::test]
async fn logout_purges_the_token_even_when_the_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    store.set(KEY, "tok-abc").unwrap();
    let client = test_client(&server, store.clone());

    let result = client.logout().await;
    assert!(matches!(result, Err(EstationError::HttpStatus { code: 500 })));
    assert_eq!(store.get(KEY).unwrap(), None, "logout always purges locally");
}

#[tokio::test]
async fn refresh_replaces_the_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer tok-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-new"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    store.set(KEY, "tok-old").unwrap();
    let client = test_client(&server, store.clone());

    let response = client.refresh_token().await.expect("refresh");
    assert_eq!(response.token, "tok-new");
    assert_eq!(store.get(KEY).unwrap().as_deref(), Some("tok-new"));
}

#[tokio::test]
async fn expired_session_maps_to_authentication_required() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    store.set(KEY, "tok-expired").unwrap();
    let client = test_client(&server, store.clone());

    let result = client.workspaces().await;
    assert!(matches!(result, Err(EstationError::AuthenticationRequired)));
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[tokio::test]
async fn service_status_decodes_health_states() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/monitoring/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "geoserver", "status": "healthy", "response_time": 41.0,
             "last_check": "2024-05-01T12:00:00Z"},
            {"name": "processing", "status": "unknown"}
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server, Arc::new(MemorySessionStore::new()));
    let services = client.service_status().await.expect("services");

    assert_eq!(services.len(), 2);
    assert_eq!(services[0].status, HealthState::Healthy);
    assert_eq!(services[1].status, HealthState::Unknown);
    assert!(services[1].response_time.is_none());
}

#[tokio::test]
async fn service_history_builds_the_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/monitoring/services/geoserver/history"))
        .and(query_param("hours", "48"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, Arc::new(MemorySessionStore::new()));
    let history = client.service_history("geoserver", 48).await.expect("history");
    assert!(history.is_empty());
}

#[tokio::test]
async fn workspace_crud_round_trip() {
    let server = MockServer::start().await;
    let workspace_body = json!({
        "id": "ws-1",
        "name": "Drought watch",
        "panels": [
            {"id": "p1", "type": "map", "position": {"x": 0, "y": 0, "w": 8, "h": 6},
             "config": {"layer": "ndvi"}}
        ],
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z"
    });

    Mock::given(method("POST"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&workspace_body))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&workspace_body))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/workspaces/ws-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&workspace_body))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/workspaces/ws-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, Arc::new(MemorySessionStore::new()));

    let new_workspace: NewWorkspace =
        serde_json::from_value(json!({"name": "Drought watch", "panels": []})).unwrap();
    let created = client.create_workspace(&new_workspace).await.expect("create");
    assert_eq!(created.id, "ws-1");
    assert_eq!(created.panels[0].config["layer"], "ndvi");

    let fetched = client.workspace("ws-1").await.expect("get");
    assert_eq!(fetched.name, "Drought watch");

    let updated =
        client.update_workspace("ws-1", &json!({"name": "Renamed"})).await.expect("update");
    assert_eq!(updated.id, "ws-1");

    client.delete_workspace("ws-1").await.expect("delete");
}

#[tokio::test]
async fn products_filters_by_dataset_when_given() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geospatial/products"))
        .and(query_param("dataset_id", "ds-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"code": "NDVI"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, Arc::new(MemorySessionStore::new()));
    let products = client.products(Some("ds-9")).await.expect("products");
    assert_eq!(products[0]["code"], "NDVI");
}

#[tokio::test]
async fn analytics_endpoints_decode_typed_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analytics/dataset-completeness"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"date": "2024-05-01", "completeness": 97.5}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/analytics/product-distribution"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"category": "vegetation", "count": 41, "percentage": 37.6}
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server, Arc::new(MemorySessionStore::new()));

    let completeness = client.dataset_completeness().await.expect("completeness");
    assert_eq!(completeness[0].completeness, 97.5);

    let distribution = client.product_distribution().await.expect("distribution");
    assert_eq!(distribution[0].category, "vegetation");
    assert_eq!(distribution[0].count, 41);
}

#[tokio::test]
async fn api_urls_reports_resolved_endpoints() {
    let server = MockServer::start().await;
    let client = test_client(&server, Arc::new(MemorySessionStore::new()));

    let urls = client.api_urls();
    assert_eq!(urls.main, server.uri());
    assert_eq!(urls.websocket, "wss://localhost/ws");
}

#[tokio::test]
async fn direct_health_bypasses_the_auth_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySessionStore::new());
    store.set(KEY, "tok-1").unwrap();
    let client = test_client(&server, store);

    let health = client.direct_health().await.expect("direct health");
    assert_eq!(health["status"], "ok");

    let requests = server.received_requests().await.unwrap();
    assert!(
        requests[0].headers.get("authorization").is_none(),
        "direct probe sends no credential"
    );
}
