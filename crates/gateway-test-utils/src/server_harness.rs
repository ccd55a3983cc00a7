//! Test server harness for E2E testing.
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.

use crate::jwks_server::MockJwksServer;
use crate::token_builders::TEST_CLIENT_ID;
use chat_gateway::agent::client::mock::MockAgentClient;
use chat_gateway::auth::{HttpKeySetFetcher, JwksClient, JwtValidator, TokenAuthorizer};
use chat_gateway::config::Config;
use chat_gateway::observability::metrics::init_metrics_recorder;
use chat_gateway::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Process-wide metrics handle; the recorder can only be installed once.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// A gateway bound to `127.0.0.1:0`, trusting a [`MockJwksServer`] and
/// talking to a [`MockAgentClient`].
///
/// # Example
/// ```rust,ignore
/// let issuer = MockJwksServer::start_serving().await;
/// let server = TestGatewayServer::spawn(&issuer, MockAgentClient::with_text(&["Hi"])).await?;
///
/// let response = reqwest::get(format!("{}/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    agent: Arc<MockAgentClient>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    pub async fn spawn(
        issuer: &MockJwksServer,
        agent: MockAgentClient,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(issuer, agent, HashMap::new()).await
    }

    /// Spawn with extra configuration variables layered over the defaults.
    pub async fn spawn_with_vars(
        issuer: &MockJwksServer,
        agent: MockAgentClient,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("SERVICE_REGION".to_string(), "test-region".to_string()),
            ("JWT_ISSUER_URL".to_string(), issuer.issuer()),
            ("JWT_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("AGENT_ID".to_string(), "test-agent".to_string()),
            ("AGENT_ALIAS_ID".to_string(), "test-alias".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let fetcher = Arc::new(HttpKeySetFetcher::new(config.jwks_fetch_timeout));
        let jwks_client = Arc::new(JwksClient::with_ttl(fetcher, config.jwks_cache_ttl));
        let validator = Arc::new(JwtValidator::new(
            jwks_client,
            config.jwt_issuer_url.clone(),
            config.jwt_client_id.clone(),
            config.jwt_clock_skew,
        ));

        let agent = Arc::new(agent);
        let state = Arc::new(AppState {
            config: config.clone(),
            authorizer: Arc::new(TokenAuthorizer::new(validator)),
            agent_client: agent.clone(),
        });

        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            agent,
            _handle: handle,
        })
    }

    /// Base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The agent the server forwards to, for call assertions.
    pub fn agent(&self) -> &MockAgentClient {
        &self.agent
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
