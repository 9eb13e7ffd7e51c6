//! The typed endpoint surface

use std::sync::Arc;

use estation_domain::{
    CategoryCount, CompletenessPoint, DistributionSlice, EstationConfig, HealthReport,
    LoginCredentials, LoginResponse, NewWorkspace, Post, Result, ServiceStatus, TokenResponse,
    User, WorkspaceConfig,
};
use estation_infra::{
    config as config_loader, ApiClient, KeychainSessionStore, RealtimeClient, SessionStore,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| estation_domain::EstationError::Serialization(e.to_string()))
}

/// Resolved endpoint summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUrls {
    pub main: String,
    pub direct: String,
    pub websocket: String,
}

/// High-level client for the eStation backend.
///
/// Owns the resilient HTTP client and the session store; realtime channels
/// are created on demand and share the same store, so both transports
/// always observe the same credential.
pub struct EstationClient {
    config: EstationConfig,
    api: ApiClient,
    session: Arc<dyn SessionStore>,
}

impl EstationClient {
    /// Build a client with the platform keychain as session storage.
    pub fn new(config: EstationConfig) -> Result<Self> {
        Self::with_session_store(config, Arc::new(KeychainSessionStore::new()))
    }

    /// Build a client over a caller-supplied session store. Tests use this
    /// with [`MemorySessionStore`](estation_infra::MemorySessionStore).
    pub fn with_session_store(
        config: EstationConfig,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.api, config.session.storage_key.clone(), session.clone())?;
        Ok(Self { config, api, session })
    }

    /// Build a client from the `ESTATION_*` environment.
    pub fn from_env() -> Result<Self> {
        Self::new(config_loader::load()?)
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &EstationConfig {
        &self.config
    }

    /// The underlying HTTP client, for endpoints not covered here.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Create a realtime channel client sharing this client's session
    /// store. Call [`connect`](RealtimeClient::connect) on the result.
    #[must_use]
    pub fn realtime(&self) -> RealtimeClient {
        RealtimeClient::new(
            self.config.realtime.clone(),
            self.config.session.storage_key.clone(),
            self.session.clone(),
        )
    }

    // ── Health and service monitoring ───────────────────────────────────

    pub async fn health_check(&self) -> Result<HealthReport> {
        self.api.get("/health").await
    }

    /// Direct backend probe, bypassing the gateway. Development aid; one
    /// bare attempt outside the retry and auth envelope.
    pub async fn direct_health(&self) -> Result<serde_json::Value> {
        let url = format!("{}/health", self.config.api.direct_url.trim_end_matches('/'));
        self.api.get_absolute(&url).await
    }

    pub async fn service_status(&self) -> Result<Vec<ServiceStatus>> {
        self.api.get("/monitoring/services").await
    }

    pub async fn service_history(&self, service_id: &str, hours: u32) -> Result<Vec<ServiceStatus>> {
        self.api.get(&format!("/monitoring/services/{service_id}/history?hours={hours}")).await
    }

    // ── Authentication ──────────────────────────────────────────────────

    /// Log in and persist the returned token as the session credential.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse> {
        let body = to_body(credentials)?;
        let response: LoginResponse = self.api.post("/auth/login", &body).await?;
        self.store_token(&response.token);
        Ok(response)
    }

    /// Log out. The local credential is purged even when the server call
    /// fails; the server result is still reported.
    pub async fn logout(&self) -> Result<()> {
        let result = self.api.post_unit("/auth/logout", None).await;
        if let Err(e) = self.session.delete(&self.config.session.storage_key) {
            warn!(error = %e, "Failed to purge session credential on logout");
        }
        result
    }

    /// Refresh the session token and persist the replacement.
    pub async fn refresh_token(&self) -> Result<TokenResponse> {
        let response: TokenResponse = self.api.post_empty("/auth/refresh").await?;
        self.store_token(&response.token);
        Ok(response)
    }

    fn store_token(&self, token: &str) {
        if let Err(e) = self.session.set(&self.config.session.storage_key, token) {
            warn!(error = %e, "Failed to persist session credential");
        }
    }

    // ── Workspace management ────────────────────────────────────────────

    pub async fn workspaces(&self) -> Result<Vec<WorkspaceConfig>> {
        self.api.get("/workspaces").await
    }

    pub async fn workspace(&self, id: &str) -> Result<WorkspaceConfig> {
        self.api.get(&format!("/workspaces/{id}")).await
    }

    pub async fn create_workspace(&self, workspace: &NewWorkspace) -> Result<WorkspaceConfig> {
        let body = to_body(workspace)?;
        self.api.post("/workspaces", &body).await
    }

    pub async fn update_workspace(
        &self,
        id: &str,
        updates: &serde_json::Value,
    ) -> Result<WorkspaceConfig> {
        self.api.put(&format!("/workspaces/{id}"), updates).await
    }

    pub async fn delete_workspace(&self, id: &str) -> Result<()> {
        self.api.delete(&format!("/workspaces/{id}")).await
    }

    // ── Geospatial data ─────────────────────────────────────────────────

    /// Dataset catalog. Rows are backend-defined and passed through opaque.
    pub async fn datasets(&self) -> Result<Vec<serde_json::Value>> {
        self.api.get("/geospatial/datasets").await
    }

    /// Product catalog, optionally filtered by dataset.
    pub async fn products(&self, dataset_id: Option<&str>) -> Result<Vec<serde_json::Value>> {
        let endpoint = match dataset_id {
            Some(id) => format!("/geospatial/products?dataset_id={id}"),
            None => "/geospatial/products".to_string(),
        };
        self.api.get(&endpoint).await
    }

    pub async fn product_categories(&self) -> Result<Vec<CategoryCount>> {
        self.api.get("/geospatial/products/categories").await
    }

    // ── Analytics ───────────────────────────────────────────────────────

    pub async fn dataset_completeness(&self) -> Result<Vec<CompletenessPoint>> {
        self.api.get("/analytics/dataset-completeness").await
    }

    pub async fn product_distribution(&self) -> Result<Vec<DistributionSlice>> {
        self.api.get("/analytics/product-distribution").await
    }

    // ── Legacy endpoints (backwards compatibility) ──────────────────────

    pub async fn users(&self) -> Result<Vec<User>> {
        self.api.get("/users").await
    }

    pub async fn user(&self, id: i64) -> Result<User> {
        self.api.get(&format!("/users/{id}")).await
    }

    pub async fn posts(&self) -> Result<Vec<Post>> {
        self.api.get("/posts").await
    }

    pub async fn post(&self, id: i64) -> Result<Post> {
        self.api.get(&format!("/posts/{id}")).await
    }

    // ── Utilities ───────────────────────────────────────────────────────

    /// Resolved endpoint summary for diagnostics.
    #[must_use]
    pub fn api_urls(&self) -> ApiUrls {
        ApiUrls {
            main: self.config.api.base_url.clone(),
            direct: self.config.api.direct_url.clone(),
            websocket: self.config.realtime.url.clone(),
        }
    }

    /// Whether verbose diagnostic logging was requested.
    #[must_use]
    pub fn is_debug_mode(&self) -> bool {
        self.config.debug
    }
}

impl std::fmt::Debug for EstationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstationClient")
            .field("base_url", &self.config.api.base_url)
            .field("debug", &self.config.debug)
            .finish_non_exhaustive()
    }
}
