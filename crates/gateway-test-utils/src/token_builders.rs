//! Builder for test token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Default audience of test tokens; matches the harness's `JWT_CLIENT_ID`.
pub const TEST_CLIENT_ID: &str = "test-chat-client";

/// Fluent builder for JWT claim sets.
///
/// Defaults to a valid ID token for `test-user` issued just now, valid for
/// an hour, with email, name and one group.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new(&issuer)
///     .for_user("alice")
///     .expires_in(-120)
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now().timestamp();
        let claims = json!({
            "sub": "test-user",
            "aud": TEST_CLIENT_ID,
            "iss": issuer,
            "iat": now,
            "nbf": now,
            "exp": now + 3600,
            "email": "test-user@example.com",
            "name": "Test User",
            "username": "test-user",
            "token_use": "id",
            "custom:groups": "users",
        });

        Self {
            claims: claims.as_object().cloned().unwrap_or_default(),
        }
    }

    pub fn for_user(mut self, subject: &str) -> Self {
        self.claims.insert("sub".to_string(), json!(subject));
        self
    }

    pub fn with_audience(mut self, audience: Value) -> Self {
        self.claims.insert("aud".to_string(), audience);
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.claims.insert("iss".to_string(), json!(issuer));
        self
    }

    /// Expiry relative to now; negative for an already expired token.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.claims.insert("exp".to_string(), json!(exp));
        self
    }

    /// Not-before relative to now.
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.claims.insert("nbf".to_string(), json!(nbf));
        self
    }

    /// Issued-at relative to now.
    pub fn issued_in(mut self, seconds: i64) -> Self {
        let iat = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.claims.insert("iat".to_string(), json!(iat));
        self
    }

    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
