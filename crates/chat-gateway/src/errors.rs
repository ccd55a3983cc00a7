//! Chat Gateway error types.
//!
//! Three layers:
//! - [`AuthError`] - the authorizer/key-set taxonomy, kept distinct for logs,
//!   metrics and tests
//! - [`AgentError`] - failures talking to the downstream agent
//! - [`GatewayError`] - what crosses the HTTP boundary
//!
//! Every `AuthError` collapses into `GatewayError::Unauthorized` at the
//! boundary, so unauthenticated callers never learn which check failed.
//! Actual errors are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::JwtValidationError;
use serde::Serialize;
use thiserror::Error;

/// Authorization failure kinds.
///
/// Display strings are for server-side logs only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Authorization header absent, empty, or not `Bearer <token>`.
    #[error("Malformed authorization header: {0}")]
    MalformedAuthHeader(&'static str),

    /// Token is not a structurally valid JWT (size, segments, header, kid).
    #[error("Malformed token")]
    MalformedToken,

    /// Token `exp` is in the past.
    #[error("Token expired")]
    TokenExpired,

    /// Signature did not verify, or no usable key matched the token.
    #[error("Token signature invalid: {0}")]
    TokenSignatureInvalid(String),

    /// Audience, issuer, nbf, iat, or a required claim failed validation.
    #[error("Token claims invalid: {0}")]
    TokenInvalidClaims(String),

    /// No key set could be fetched and none was cached.
    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),
}

impl AuthError {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedAuthHeader(_) => "malformed_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenSignatureInvalid(_) => "token_signature_invalid",
            AuthError::TokenInvalidClaims(_) => "token_invalid_claims",
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
        }
    }
}

impl From<JwtValidationError> for AuthError {
    fn from(err: JwtValidationError) -> Self {
        match err {
            JwtValidationError::TokenTooLarge
            | JwtValidationError::MalformedToken
            | JwtValidationError::MissingKid => AuthError::MalformedToken,
            JwtValidationError::IatTooFarInFuture => {
                AuthError::TokenInvalidClaims("iat is in the future".to_string())
            }
        }
    }
}

/// Downstream agent failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The agent refused our credentials.
    #[error("Agent access denied")]
    AccessDenied,

    /// The agent is throttling or out of quota.
    #[error("Agent throttled")]
    Throttled,

    /// Transport failure or unexpected status.
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    /// An event in the response stream could not be decoded.
    #[error("Agent stream decode error: {0}")]
    Decode(String),
}

/// Error type returned by HTTP handlers.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 Unauthorized
/// - BadRequest: 400 Bad Request
/// - Forbidden: 403 Forbidden
/// - RateLimitExceeded: 429 Too Many Requests
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthorized => 401,
            GatewayError::BadRequest(_) => 400,
            GatewayError::Forbidden(_) => 403,
            GatewayError::RateLimitExceeded => 429,
            GatewayError::Internal => 500,
        }
    }
}

/// Every authorization failure is the same failure to the caller.
impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(target: "gateway.auth", kind = err.kind(), error = %err, "Authorization denied");
        GatewayError::Unauthorized
    }
}

impl From<AgentError> for GatewayError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::AccessDenied => {
                GatewayError::Forbidden("Access denied to agent".to_string())
            }
            AgentError::Throttled => GatewayError::RateLimitExceeded,
            AgentError::Unavailable(reason) | AgentError::Decode(reason) => {
                tracing::error!(target: "gateway.agent", reason = %reason, "Agent invocation failed");
                GatewayError::Internal
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(rename = "statusCode")]
    status_code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            GatewayError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, format!("Invalid request: {reason}"))
            }
            GatewayError::Forbidden(reason) => (StatusCode::FORBIDDEN, reason.clone()),
            GatewayError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Service temporarily unavailable. Please try again later.".to_string(),
            ),
            GatewayError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal service error".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: message,
            status_code: status.as_u16(),
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"chat-gateway\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
