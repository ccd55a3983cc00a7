//! Mock token issuer serving a JWKS document over wiremock.

use crate::crypto_fixtures::TestKeypair;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the gateway fetches key sets from, relative to the issuer.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// An issuer whose base URL is a local wiremock server.
///
/// Nothing is mounted by default, so each test states how many key set
/// fetches it expects:
///
/// ```rust,ignore
/// let issuer = MockJwksServer::start().await;
/// issuer.jwks_mock().expect(1).mount(issuer.server()).await;
/// ```
pub struct MockJwksServer {
    server: MockServer,
    keypair: TestKeypair,
}

impl MockJwksServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            keypair: TestKeypair::new(1, "test-key-01"),
        }
    }

    /// Start and serve the key set for any number of fetches.
    pub async fn start_serving() -> Self {
        let issuer = Self::start().await;
        issuer.jwks_mock().mount(&issuer.server).await;
        issuer
    }

    /// Issuer URL, as it appears in `iss` and `JWT_ISSUER_URL`.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn keypair(&self) -> &TestKeypair {
        &self.keypair
    }

    pub fn jwks_json(&self) -> Value {
        json!({ "keys": [self.keypair.jwk_json()] })
    }

    /// Unmounted mock answering key set fetches with this issuer's keys.
    pub fn jwks_mock(&self) -> Mock {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.jwks_json()))
    }

    /// Unmounted mock failing key set fetches with `status`.
    pub fn failing_jwks_mock(&self, status: u16) -> Mock {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
    }

    /// Sign `claims` with this issuer's key.
    pub fn sign(&self, claims: &Value) -> String {
        self.keypair.sign(claims)
    }
}
