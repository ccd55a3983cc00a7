//! JWT claims and the normalized user-info projection.
//!
//! The `sub` field is redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A claim that identity providers emit either as a single string or as a
/// list of strings (`aud`, `custom:groups`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Normalize to a list; a single string becomes a one-element list.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Claims of a verified access token.
///
/// `sub`, `aud`, `iss`, `exp`, `iat` and `nbf` are required; a token missing
/// any of them fails to deserialize and is rejected.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    pub aud: OneOrMany,

    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Not-before timestamp (Unix epoch seconds).
    pub nbf: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    /// Group memberships.
    #[serde(
        default,
        rename = "custom:groups",
        skip_serializing_if = "Option::is_none"
    )]
    pub groups: Option<OneOrMany>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("token_use", &self.token_use)
            .finish_non_exhaustive()
    }
}

/// Normalized view of the caller, built from verified claims.
///
/// Optional claims become empty strings or empty lists, never `None`.
#[derive(Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub groups: Vec<String>,
    pub token_use: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<Claims> for UserInfo {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.unwrap_or_default(),
            name: claims.name.unwrap_or_default(),
            username: claims.username.unwrap_or_default(),
            groups: claims.groups.map(OneOrMany::into_vec).unwrap_or_default(),
            token_use: claims.token_use.unwrap_or_default(),
            issuer: claims.iss,
            audience: claims.aud.into_vec(),
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

impl UserInfo {
    /// Flatten into the string-valued policy context.
    ///
    /// Lists are comma-joined and timestamps rendered as decimal seconds.
    /// Every field has a non-null value, so nothing is dropped. The map is
    /// ordered, making the output identical for identical claims.
    pub fn to_context(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("userId".to_string(), self.user_id.clone()),
            ("email".to_string(), self.email.clone()),
            ("name".to_string(), self.name.clone()),
            ("username".to_string(), self.username.clone()),
            ("groups".to_string(), self.groups.join(",")),
            ("tokenUse".to_string(), self.token_use.clone()),
            ("issuer".to_string(), self.issuer.clone()),
            ("audience".to_string(), self.audience.join(",")),
            ("issuedAt".to_string(), self.issued_at.to_string()),
            ("expiresAt".to_string(), self.expires_at.to_string()),
        ])
    }
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("user_id", &"[REDACTED]")
            .field("groups", &self.groups)
            .field("token_use", &self.token_use)
            .field("issuer", &self.issuer)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
