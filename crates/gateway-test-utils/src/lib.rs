//! # Gateway Test Utilities
//!
//! Shared fixtures for Chat Gateway tests:
//! - Deterministic Ed25519 signing keys (`TestKeypair`)
//! - Claim builders (`TestTokenBuilder`)
//! - A wiremock-backed issuer serving a JWKS (`MockJwksServer`)
//! - A real gateway on a random port (`TestGatewayServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let issuer = MockJwksServer::start().await;
//!     let server = TestGatewayServer::spawn(&issuer, MockAgentClient::with_text(&["hi"])).await?;
//!
//!     let token = issuer.sign(&TestTokenBuilder::new(&issuer.issuer()).build());
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/chat", server.url()))
//!         .bearer_auth(token)
//!         .json(&serde_json::json!({"message": "hello"}))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod server_harness;
pub mod token_builders;

pub use chat_gateway::agent::client::mock::MockAgentClient;
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use server_harness::*;
pub use token_builders::*;
