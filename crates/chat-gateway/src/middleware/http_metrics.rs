//! HTTP metrics middleware.
//!
//! Applied outermost so framework-level rejections (404, 405, timeouts) are
//! counted alongside handler responses.

use crate::observability::metrics::record_http_request;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Record method, normalized path, status and duration for every response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    async fn accepted() -> StatusCode {
        StatusCode::ACCEPTED
    }

    fn test_app() -> Router {
        Router::new()
            .route("/chat", post(accepted))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn send(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_passes_handler_response_through() {
        assert_eq!(send("POST", "/chat").await, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_sees_router_rejections() {
        assert_eq!(send("GET", "/nowhere").await, StatusCode::NOT_FOUND);
        assert_eq!(send("GET", "/chat").await, StatusCode::METHOD_NOT_ALLOWED);
    }
}
