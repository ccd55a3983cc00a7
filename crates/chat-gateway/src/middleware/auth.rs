//! Authentication middleware for protected routes.
//!
//! Runs the token authorizer against the inbound request and, on success,
//! injects the caller's [`UserInfo`] into request extensions.

use crate::auth::{AuthorizationRequest, TokenAuthorizer, UserInfo};
use crate::errors::GatewayError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authorizer: Arc<TokenAuthorizer>,
}

/// Reject the request with 401 unless it carries a valid bearer token.
///
/// The resource handed to the authorizer is `"<METHOD> <path>"`. A header
/// that is not visible ASCII is treated as empty, which the authorizer
/// rejects as malformed.
#[instrument(skip_all, name = "gateway.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let authorization_token = req
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default().to_string());

    let auth_request = AuthorizationRequest {
        method_arn: format!("{} {}", req.method(), req.uri().path()),
        authorization_token,
        headers: None,
    };

    let (_, user) = state.authorizer.authorize_user(&auth_request).await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Convenience accessor for handlers holding the raw request.
pub trait UserInfoExt {
    /// `None` if `require_auth` did not run for this request.
    fn user_info(&self) -> Option<&UserInfo>;
}

impl<B> UserInfoExt for axum::extract::Request<B> {
    fn user_info(&self) -> Option<&UserInfo> {
        self.extensions().get::<UserInfo>()
    }
}
