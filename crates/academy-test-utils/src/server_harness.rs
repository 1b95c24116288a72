//! Test server harness for E2E testing
//!
//! Provides `TestAcademyServer` for spawning real academy server instances in
//! tests, wired to a mock JWKS endpoint.

use crate::crypto_fixtures::{jwks_json, TestRsaKey};
use crate::token_builders::TEST_POLICY_AUD;
use academy_service::config::Config;
use academy_service::routes::{self, AppState};
use common::kv::MemoryKvStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock JWKS endpoint is served under.
pub const TEST_JWKS_PATH: &str = "/cdn-cgi/access/certs";

/// Test harness for spawning the academy service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_health_flow_e2e(pool: SqlitePool) -> Result<()> {
///     let server = TestAcademyServer::spawn(pool).await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .get(&format!("{}/health", server.url()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestAcademyServer {
    addr: SocketAddr,
    pool: SqlitePool,
    config: Config,
    jwks_server: MockServer,
    _handle: JoinHandle<()>,
}

impl TestAcademyServer {
    /// Spawn a server whose JWKS endpoint publishes the primary and
    /// secondary test keys.
    pub async fn spawn(pool: SqlitePool) -> Result<Self, anyhow::Error> {
        Self::spawn_with(
            pool,
            &[&TestRsaKey::primary(), &TestRsaKey::secondary()],
            &[],
        )
        .await
    }

    /// Spawn a server with a custom published key set and extra
    /// environment variables layered over the test defaults.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Cache JWKS documents in a fresh in-memory store
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        pool: SqlitePool,
        keys: &[&TestRsaKey],
        extra_vars: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let jwks_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEST_JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&jwks_server)
            .await;

        let mut vars = HashMap::from([
            ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "JWKS_URI".to_string(),
                format!("{}{}", jwks_server.uri(), TEST_JWKS_PATH),
            ),
            ("POLICY_AUD".to_string(), TEST_POLICY_AUD.to_string()),
        ]);
        for (name, value) in extra_vars {
            vars.insert(name.to_string(), value.to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState {
            pool: pool.clone(),
            config: config.clone(),
            kv_store: Arc::new(MemoryKvStore::new()),
        });

        // Handle without a global recorder; /metrics renders an empty page
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            config,
            jwks_server,
            _handle: handle,
        })
    }

    /// Get reference to the database pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the mock JWKS server, e.g. to count fetches.
    pub fn jwks_server(&self) -> &MockServer {
        &self.jwks_server
    }

    /// Number of requests the JWKS endpoint has served so far.
    pub async fn jwks_fetch_count(&self) -> usize {
        self.jwks_server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

impl Drop for TestAcademyServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
