//! HTTP routes for the Chat Gateway.
//!
//! Defines the Axum router and application state.

use crate::agent::AgentClient;
use crate::auth::TokenAuthorizer;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Whole-request deadline; the agent timeout must stay below it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Shared by `/authorize` and the `/chat` auth middleware, so both use
    /// one key set cache.
    pub authorizer: Arc<TokenAuthorizer>,

    /// Downstream conversational agent.
    pub agent_client: Arc<dyn AgentClient>,
}

/// Build the application routes.
///
/// - `/health` - liveness check, public
/// - `/authorize` - token authorizer over HTTP, public
/// - `/metrics` - Prometheus scrape endpoint, public
/// - `/chat` - agent proxy, requires a bearer token
///
/// Wrapped in CORS, request tracing, a 30 second timeout and HTTP metrics.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        authorizer: state.authorizer.clone(),
    });
    let cors = cors_layer(&state.config.cors_origin);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/authorize", post(handlers::authorize))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. CorsLayer - answers preflights before auth runs
    // 4. http_metrics_middleware (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// CORS policy for browser clients.
///
/// `*` allows any origin without credentials. Any other value is an exact
/// origin and allows credentials. An origin that is not a valid header value
/// allows nothing.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ]);

    if origin == "*" {
        return layer.allow_origin(AllowOrigin::any());
    }

    match HeaderValue::from_str(origin) {
        Ok(value) => layer
            .allow_origin(AllowOrigin::exact(value))
            .allow_credentials(true),
        Err(e) => {
            tracing::warn!(target: "gateway.routes", origin = %origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    async fn preflight(layer: CorsLayer, origin: &str) -> axum::http::Response<Body> {
        let app = Router::new()
            .route("/chat", post(|| async { "ok" }))
            .layer(layer);

        app.oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/chat")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "authorization,content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_cors_wildcard() {
        let response = preflight(cors_layer("*"), "https://app.example.com").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
        assert!(response
            .headers()
            .get("access-control-allow-credentials")
            .is_none());
    }

    #[tokio::test]
    async fn test_cors_exact_origin() {
        let layer = cors_layer("https://app.example.com");

        let response = preflight(layer.clone(), "https://app.example.com").await;
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );
        assert_eq!(
            response.headers()["access-control-allow-credentials"],
            "true"
        );

        let response = preflight(layer, "https://evil.example.com").await;
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }
}
