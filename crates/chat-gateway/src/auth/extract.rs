//! Bearer token extraction.
//!
//! The gateway hands the authorizer one of several request shapes: a
//! pre-extracted `authorizationToken`, or a `headers` map whose key casing
//! depends on the client. Each shape is an extraction strategy; they are
//! tried in order and the first that yields a value wins.

use crate::errors::AuthError;
use common::secret::SecretString;
use serde::Deserialize;
use std::collections::HashMap;

/// Authorization request as delivered by the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Resource being accessed; echoed into the policy.
    pub method_arn: String,

    #[serde(default)]
    pub authorization_token: Option<String>,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

type Strategy = fn(&AuthorizationRequest) -> Option<&str>;

/// Extraction strategies, in priority order.
const STRATEGIES: [Strategy; 4] = [
    token_field,
    canonical_header,
    lowercase_header,
    any_case_header,
];

fn token_field(req: &AuthorizationRequest) -> Option<&str> {
    req.authorization_token.as_deref()
}

fn canonical_header(req: &AuthorizationRequest) -> Option<&str> {
    req.headers.as_ref()?.get("Authorization").map(String::as_str)
}

fn lowercase_header(req: &AuthorizationRequest) -> Option<&str> {
    req.headers.as_ref()?.get("authorization").map(String::as_str)
}

fn any_case_header(req: &AuthorizationRequest) -> Option<&str> {
    req.headers
        .as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.as_str())
}

/// Raw authorization header value from the first matching strategy.
pub fn raw_authorization(req: &AuthorizationRequest) -> Option<&str> {
    STRATEGIES.iter().find_map(|strategy| strategy(req))
}

/// Split `Bearer <token>` into its token.
///
/// The scheme is case-insensitive. Exactly two whitespace-separated parts are
/// required.
///
/// # Errors
///
/// `AuthError::MalformedAuthHeader` when empty, not two parts, or not Bearer.
pub fn parse_bearer(value: &str) -> Result<SecretString, AuthError> {
    let mut parts = value.split_whitespace();

    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(if value.trim().is_empty() {
            AuthError::MalformedAuthHeader("empty")
        } else {
            AuthError::MalformedAuthHeader("expected two parts")
        });
    };

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedAuthHeader("unsupported scheme"));
    }

    Ok(SecretString::from(token))
}

/// Locate and parse the bearer token of an authorization request.
///
/// # Errors
///
/// `AuthError::MalformedAuthHeader` if no strategy finds a header or the value
/// is not a bearer credential.
pub fn extract_bearer_token(req: &AuthorizationRequest) -> Result<SecretString, AuthError> {
    let value = raw_authorization(req).ok_or(AuthError::MalformedAuthHeader("missing"))?;
    parse_bearer(value)
}
