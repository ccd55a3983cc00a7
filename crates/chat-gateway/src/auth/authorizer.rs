//! Token authorizer: bearer token in, access decision out.

use crate::auth::claims::UserInfo;
use crate::auth::extract::{extract_bearer_token, AuthorizationRequest};
use crate::auth::jwt::JwtValidator;
use crate::auth::policy::AccessDecision;
use crate::errors::AuthError;
use crate::observability::metrics::record_authorization;
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// Turns authorization requests into [`AccessDecision`]s.
///
/// Every failure is an `Err`; no deny decision is ever built. Callers at the
/// HTTP boundary must collapse the error into one opaque denial.
pub struct TokenAuthorizer {
    validator: Arc<JwtValidator>,
}

impl TokenAuthorizer {
    pub fn new(validator: Arc<JwtValidator>) -> Self {
        Self { validator }
    }

    /// Authorize a request for the resource it names.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] kind. Header problems are detected before any key
    /// set lookup or signature work.
    pub async fn authorize(&self, req: &AuthorizationRequest) -> Result<AccessDecision, AuthError> {
        self.authorize_user(req).await.map(|(decision, _)| decision)
    }

    /// Like [`authorize`](Self::authorize), also returning the caller's
    /// normalized user info.
    #[instrument(skip_all, fields(resource = %req.method_arn))]
    pub async fn authorize_user(
        &self,
        req: &AuthorizationRequest,
    ) -> Result<(AccessDecision, UserInfo), AuthError> {
        let result = self.decide(req).await;
        record_authorization(result.as_ref().err().map(AuthError::kind));

        match &result {
            Ok(_) => {
                tracing::info!(target: "gateway.auth.authorizer", "Access granted");
            }
            Err(e) => {
                tracing::info!(target: "gateway.auth.authorizer", kind = e.kind(), error = %e, "Access denied");
            }
        }

        result
    }

    async fn decide(
        &self,
        req: &AuthorizationRequest,
    ) -> Result<(AccessDecision, UserInfo), AuthError> {
        let token = extract_bearer_token(req)?;
        let user = self.authenticate(&token).await?;
        let decision =
            AccessDecision::allow(user.user_id.clone(), req.method_arn.clone(), user.to_context());

        Ok((decision, user))
    }

    async fn authenticate(&self, token: &SecretString) -> Result<UserInfo, AuthError> {
        let claims = self.validator.validate(token.expose_secret()).await?;
        Ok(UserInfo::from(claims))
    }
}
