//! Authentication and authorization.
//!
//! # Components
//!
//! - `extract` - bearer token extraction from the accepted request shapes
//! - `jwks` - per-issuer key set cache with stale-on-error fallback
//! - `jwt` - JWT validation using cached key sets
//! - `claims` - JWT claims and the normalized user-info projection
//! - `policy` - access decisions and the gateway policy document
//! - `authorizer` - the token authorizer tying these together

pub mod authorizer;
pub mod claims;
pub mod extract;
pub mod jwks;
pub mod jwt;
pub mod policy;

pub use authorizer::TokenAuthorizer;
pub use claims::{Claims, UserInfo};
pub use extract::AuthorizationRequest;
pub use jwks::{HttpKeySetFetcher, JwksClient, KeySetCache, KeySetFetcher};
pub use jwt::JwtValidator;
pub use policy::{AccessDecision, Effect};
