//! JWT validation against the identity provider's key set.
//!
//! # Security
//!
//! - Tokens are size-checked and their `kid` extracted BEFORE any key lookup
//! - The algorithm comes from the matching JWK, never from the token alone
//! - `aud`, `iss`, `exp`, `nbf` and `iat` are all required and validated
//! - Failures are classified for logs; the HTTP boundary collapses them

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::AuthError;
use common::jwt::{decode_jwk_component, inspect_header, validate_iat};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Claims every accepted token must carry.
const REQUIRED_CLAIMS: [&str; 5] = ["exp", "nbf", "aud", "iss", "sub"];

/// Validates access tokens issued by one identity provider for one client.
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,

    /// Expected `iss`; also the key set discovery base.
    issuer: String,

    /// Expected `aud` (the OAuth client id).
    audience: String,

    /// How far in the future `iat` may be. `exp` and `nbf` get no leeway.
    clock_skew: Duration,
}

impl JwtValidator {
    pub fn new(
        jwks_client: Arc<JwksClient>,
        issuer: String,
        audience: String,
        clock_skew: Duration,
    ) -> Self {
        Self {
            jwks_client,
            issuer,
            audience,
            clock_skew,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Validate a JWT and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and `kid` extraction (no network work for junk tokens)
    /// 2. Key set lookup for the configured issuer
    /// 3. Key selection by `kid`
    /// 4. Signature verification with the JWK's algorithm
    /// 5. `exp` strictly in the future, `nbf` not in the future, `aud`, `iss`
    /// 6. `iat` not too far in the future
    ///
    /// # Errors
    ///
    /// `MalformedToken`, `TokenExpired`, `TokenSignatureInvalid`,
    /// `TokenInvalidClaims` or `KeySetUnavailable`.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = inspect_header(token).map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", error = ?e, "Token header inspection failed");
            AuthError::from(e)
        })?;

        let key_set = self.jwks_client.get_key_set(&self.issuer).await?;

        let jwk = key_set.get(&header.kid).ok_or_else(|| {
            tracing::debug!(target: "gateway.auth.jwt", kid = %header.kid, "No key for token kid");
            AuthError::TokenSignatureInvalid(format!("unknown kid {}", header.kid))
        })?;

        let (decoding_key, algorithm) = decoding_key_for(jwk)?;

        if let Some(declared) = header.alg.as_deref() {
            if algorithm_name(algorithm) != declared {
                tracing::debug!(
                    target: "gateway.auth.jwt",
                    declared = %declared,
                    expected = algorithm_name(algorithm),
                    "Token algorithm does not match key"
                );
                return Err(AuthError::TokenSignatureInvalid(
                    "algorithm mismatch".to_string(),
                ));
            }
        }

        let claims = self.verify(token, &decoding_key, algorithm)?;

        validate_iat(claims.iat, self.clock_skew).map_err(|e| {
            tracing::debug!(target: "gateway.auth.jwt", error = ?e, "Token iat validation failed");
            AuthError::from(e)
        })?;

        tracing::debug!(target: "gateway.auth.jwt", "Token validated successfully");
        Ok(claims)
    }

    fn verify(
        &self,
        token: &str,
        decoding_key: &DecodingKey,
        algorithm: Algorithm,
    ) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);

        decode::<Claims>(token, decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(target: "gateway.auth.jwt", error = %e, "Token verification failed");
                classify(e.kind())
            })
    }
}

/// Build a decoding key and the algorithm to verify with from a JWK.
///
/// RSA keys use their `alg` (RS256/RS384/RS512, default RS256); OKP keys
/// must be Ed25519 and use EdDSA.
fn decoding_key_for(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    let unusable = |reason: &str| {
        tracing::warn!(target: "gateway.auth.jwt", kid = ?jwk.kid, kty = %jwk.kty, reason = %reason, "Unusable JWK");
        AuthError::TokenSignatureInvalid(format!("unusable key: {reason}"))
    };

    match jwk.kty.as_str() {
        "RSA" => {
            let algorithm = match jwk.alg.as_deref() {
                None | Some("RS256") => Algorithm::RS256,
                Some("RS384") => Algorithm::RS384,
                Some("RS512") => Algorithm::RS512,
                Some(_) => return Err(unusable("unsupported RSA algorithm")),
            };
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                return Err(unusable("missing n or e"));
            };
            let key = DecodingKey::from_rsa_components(n, e)
                .map_err(|_| unusable("invalid RSA components"))?;
            Ok((key, algorithm))
        }
        "OKP" => {
            if jwk.crv.as_deref() != Some("Ed25519") {
                return Err(unusable("unsupported curve"));
            }
            if jwk.alg.as_deref().is_some_and(|alg| alg != "EdDSA") {
                return Err(unusable("unsupported OKP algorithm"));
            }
            let x = jwk.x.as_deref().ok_or_else(|| unusable("missing x"))?;
            let public_key = decode_jwk_component(x).map_err(|_| unusable("invalid x encoding"))?;
            Ok((DecodingKey::from_ed_der(&public_key), Algorithm::EdDSA))
        }
        _ => Err(unusable("unsupported key type")),
    }
}

fn algorithm_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::EdDSA => "EdDSA",
        _ => "unsupported",
    }
}

/// Map a verification failure onto the authorizer's error kinds.
fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey => {
            AuthError::TokenSignatureInvalid("signature verification failed".to_string())
        }
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
            AuthError::MalformedToken
        }
        ErrorKind::InvalidAudience => AuthError::TokenInvalidClaims("aud".to_string()),
        ErrorKind::InvalidIssuer => AuthError::TokenInvalidClaims("iss".to_string()),
        ErrorKind::ImmatureSignature => AuthError::TokenInvalidClaims("nbf".to_string()),
        ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::TokenInvalidClaims(format!("missing {claim}"))
        }
        other => AuthError::TokenInvalidClaims(format!("{other:?}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{KeySet, KeySetFetcher};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ISSUER: &str = "https://idp.example.com/tenant";

    struct FixedFetcher {
        key_set: KeySet,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeySetFetcher for FixedFetcher {
        async fn fetch(&self, _issuer: &str) -> Result<KeySet, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.key_set.clone())
        }
    }

    fn okp(kid: &str) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            kid: Some(kid.to_string()),
            alg: Some("EdDSA".to_string()),
            key_use: Some("sig".to_string()),
            n: None,
            e: None,
            crv: Some("Ed25519".to_string()),
            x: Some(URL_SAFE_NO_PAD.encode([7u8; 32])),
        }
    }

    fn validator_with(keys: Vec<Jwk>) -> (JwtValidator, Arc<FixedFetcher>) {
        let fetcher = Arc::new(FixedFetcher {
            key_set: KeySet::from_keys(keys),
            calls: AtomicUsize::new(0),
        });
        let jwks = Arc::new(JwksClient::new(fetcher.clone()));
        let validator = JwtValidator::new(
            jwks,
            ISSUER.to_string(),
            "chat-client".to_string(),
            Duration::from_secs(60),
        );
        (validator, fetcher)
    }

    fn fake_token(header: &str) -> String {
        let payload = r#"{"sub":"u","exp":9999999999,"iat":1,"nbf":1,"aud":"chat-client","iss":"x"}"#;
        format!(
            "{}.{}.c2lnbmF0dXJl",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[tokio::test]
    async fn test_malformed_token_skips_key_lookup() {
        let (validator, fetcher) = validator_with(vec![okp("key-1")]);

        for token in ["", "not-a-jwt", "a.b", "a.b.c.d"] {
            assert_eq!(
                validator.validate(token).await.unwrap_err(),
                AuthError::MalformedToken
            );
        }
        let missing_kid = fake_token(r#"{"alg":"EdDSA"}"#);
        assert_eq!(
            validator.validate(&missing_kid).await.unwrap_err(),
            AuthError::MalformedToken
        );

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_kid_is_signature_invalid() {
        let (validator, _) = validator_with(vec![okp("key-1")]);
        let token = fake_token(r#"{"alg":"EdDSA","kid":"other"}"#);

        assert!(matches!(
            validator.validate(&token).await.unwrap_err(),
            AuthError::TokenSignatureInvalid(_)
        ));
    }

    #[tokio::test]
    async fn test_algorithm_mismatch_is_signature_invalid() {
        let (validator, _) = validator_with(vec![okp("key-1")]);
        let token = fake_token(r#"{"alg":"HS256","kid":"key-1"}"#);

        assert_eq!(
            validator.validate(&token).await.unwrap_err(),
            AuthError::TokenSignatureInvalid("algorithm mismatch".to_string())
        );
    }

    #[tokio::test]
    async fn test_bad_signature_is_signature_invalid() {
        let (validator, _) = validator_with(vec![okp("key-1")]);
        let token = fake_token(r#"{"alg":"EdDSA","kid":"key-1"}"#);

        assert!(matches!(
            validator.validate(&token).await.unwrap_err(),
            AuthError::TokenSignatureInvalid(_)
        ));
    }

    #[test]
    fn test_decoding_key_for_rsa_algorithms() {
        let rsa = |alg: Option<&str>| Jwk {
            kty: "RSA".to_string(),
            kid: Some("rsa".to_string()),
            alg: alg.map(ToString::to_string),
            key_use: None,
            n: Some(URL_SAFE_NO_PAD.encode([0xb1u8; 256])),
            e: Some("AQAB".to_string()),
            crv: None,
            x: None,
        };

        assert_eq!(decoding_key_for(&rsa(None)).unwrap().1, Algorithm::RS256);
        assert_eq!(
            decoding_key_for(&rsa(Some("RS384"))).unwrap().1,
            Algorithm::RS384
        );
        assert_eq!(
            decoding_key_for(&rsa(Some("RS512"))).unwrap().1,
            Algorithm::RS512
        );
        assert!(decoding_key_for(&rsa(Some("HS256"))).is_err());
    }

    #[test]
    fn test_decoding_key_for_rejects_unusable_keys() {
        let mut missing_x = okp("k");
        missing_x.x = None;

        let mut wrong_curve = okp("k");
        wrong_curve.crv = Some("X25519".to_string());

        let mut wrong_alg = okp("k");
        wrong_alg.alg = Some("RS256".to_string());

        let mut ec = okp("k");
        ec.kty = "EC".to_string();

        let mut rsa_missing_e = okp("k");
        rsa_missing_e.kty = "RSA".to_string();
        rsa_missing_e.alg = None;
        rsa_missing_e.n = Some("AQAB".to_string());

        for jwk in [missing_x, wrong_curve, wrong_alg, ec, rsa_missing_e] {
            assert!(
                matches!(
                    decoding_key_for(&jwk),
                    Err(AuthError::TokenSignatureInvalid(_))
                ),
                "{jwk:?} should be unusable"
            );
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&ErrorKind::ExpiredSignature), AuthError::TokenExpired);
        assert!(matches!(
            classify(&ErrorKind::InvalidSignature),
            AuthError::TokenSignatureInvalid(_)
        ));
        assert_eq!(classify(&ErrorKind::InvalidToken), AuthError::MalformedToken);
        assert_eq!(
            classify(&ErrorKind::InvalidAudience),
            AuthError::TokenInvalidClaims("aud".to_string())
        );
        assert_eq!(
            classify(&ErrorKind::InvalidIssuer),
            AuthError::TokenInvalidClaims("iss".to_string())
        );
        assert_eq!(
            classify(&ErrorKind::ImmatureSignature),
            AuthError::TokenInvalidClaims("nbf".to_string())
        );
        assert_eq!(
            classify(&ErrorKind::MissingRequiredClaim("nbf".to_string())),
            AuthError::TokenInvalidClaims("missing nbf".to_string())
        );
    }
}
