//! Chat Gateway
//!
//! Validates bearer tokens and proxies chat messages to the agent.

use chat_gateway::agent::HttpAgentClient;
use chat_gateway::auth::{HttpKeySetFetcher, JwksClient, JwtValidator, TokenAuthorizer};
use chat_gateway::config::Config;
use chat_gateway::observability::metrics::init_metrics_recorder;
use chat_gateway::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Chat Gateway");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        region = %config.region,
        bind_address = %config.bind_address,
        issuer = %config.jwt_issuer_url,
        agent_endpoint = %config.agent_endpoint_url,
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        jwks_cache_ttl_seconds = config.jwks_cache_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let fetcher = Arc::new(HttpKeySetFetcher::new(config.jwks_fetch_timeout));
    let jwks_client = Arc::new(JwksClient::with_ttl(fetcher, config.jwks_cache_ttl));
    let validator = Arc::new(JwtValidator::new(
        jwks_client,
        config.jwt_issuer_url.clone(),
        config.jwt_client_id.clone(),
        config.jwt_clock_skew,
    ));
    let authorizer = Arc::new(TokenAuthorizer::new(validator));

    let agent_client = Arc::new(HttpAgentClient::new(
        config.agent_endpoint_url.clone(),
        config.agent_id.clone(),
        config.agent_alias_id.clone(),
        config.agent_timeout,
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        config,
        authorizer,
        agent_client,
    });

    let app = routes::build_routes(state, metrics_handle);

    info!("Chat Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chat Gateway shutdown complete");

    Ok(())
}

/// `RUST_LOG` filter, defaulting to info. `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chat_gateway=info,tower_http=info".into());

    let fmt_layer = if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
