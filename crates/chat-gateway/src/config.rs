//! Chat Gateway configuration.
//!
//! Configuration is loaded from environment variables. [`Config::from_vars`]
//! takes an explicit map so tests never touch the process environment.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default key set cache TTL (1 hour).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 3600;

/// Default timeout for one key set fetch.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default downstream agent base URL.
pub const DEFAULT_AGENT_ENDPOINT_URL: &str = "http://localhost:8090";

/// Default timeout for one agent invocation, including streaming the body.
pub const DEFAULT_AGENT_TIMEOUT_SECONDS: u64 = 25;

/// Default CORS origin.
pub const DEFAULT_CORS_ORIGIN: &str = "*";

/// Chat Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Deployment region reported by the health endpoint.
    pub region: String,

    /// Identity provider issuer URL, without a trailing slash.
    /// Tokens must carry exactly this `iss`.
    pub jwt_issuer_url: String,

    /// OAuth client id. Tokens must carry this `aud`.
    pub jwt_client_id: String,

    /// How far in the future `iat` may be. Expiry and not-before get no leeway.
    pub jwt_clock_skew: Duration,

    /// How long a fetched key set is served without refetching.
    pub jwks_cache_ttl: Duration,

    /// Bound on a single key set fetch.
    pub jwks_fetch_timeout: Duration,

    /// Downstream agent runtime base URL.
    pub agent_endpoint_url: String,

    /// Agent identifier.
    pub agent_id: String,

    /// Agent alias identifier.
    pub agent_alias_id: String,

    /// Bound on a single agent invocation.
    pub agent_timeout: Duration,

    /// Allowed CORS origin ("*" for any).
    pub cors_origin: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_issuer_url = required(vars, "JWT_ISSUER_URL")?
            .trim_end_matches('/')
            .to_string();
        let jwt_client_id = required(vars, "JWT_CLIENT_ID")?;
        let agent_id = required(vars, "AGENT_ID")?;
        let agent_alias_id = required(vars, "AGENT_ALIAS_ID")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let region = vars
            .get("SERVICE_REGION")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());

        let agent_endpoint_url = vars
            .get("AGENT_ENDPOINT_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_AGENT_ENDPOINT_URL.to_string());

        let cors_origin = vars
            .get("CORS_ORIGIN")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let jwks_cache_ttl =
            positive_seconds(vars, "JWKS_CACHE_TTL_SECONDS", DEFAULT_JWKS_CACHE_TTL_SECONDS)?;
        let jwks_fetch_timeout = positive_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;
        let agent_timeout =
            positive_seconds(vars, "AGENT_TIMEOUT_SECONDS", DEFAULT_AGENT_TIMEOUT_SECONDS)?;

        Ok(Config {
            bind_address,
            region,
            jwt_issuer_url,
            jwt_client_id,
            jwt_clock_skew,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            agent_endpoint_url,
            agent_id,
            agent_alias_id,
            agent_timeout,
            cors_origin,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn positive_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Duration::from_secs(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "JWT_ISSUER_URL".to_string(),
                "https://idp.example.com/tenant".to_string(),
            ),
            ("JWT_CLIENT_ID".to_string(), "chat-client".to_string()),
            ("AGENT_ID".to_string(), "AGENT123".to_string()),
            ("AGENT_ALIAS_ID".to_string(), "ALIAS456".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.region, "unknown");
        assert_eq!(config.jwt_issuer_url, "https://idp.example.com/tenant");
        assert_eq!(config.jwt_client_id, "chat-client");
        assert_eq!(config.jwt_clock_skew, DEFAULT_CLOCK_SKEW);
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.jwks_fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.agent_endpoint_url, DEFAULT_AGENT_ENDPOINT_URL);
        assert_eq!(config.agent_timeout, Duration::from_secs(25));
        assert_eq!(config.cors_origin, "*");
    }

    #[test]
    fn test_from_vars_overrides() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("SERVICE_REGION".to_string(), "eu-west-1".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "600".to_string());
        vars.insert(
            "AGENT_ENDPOINT_URL".to_string(),
            "https://agent.internal/".to_string(),
        );
        vars.insert(
            "CORS_ORIGIN".to_string(),
            "https://chat.example.com".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.jwt_clock_skew, Duration::from_secs(120));
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(600));
        assert_eq!(config.agent_endpoint_url, "https://agent.internal");
        assert_eq!(config.cors_origin, "https://chat.example.com");
    }

    #[test]
    fn test_issuer_trailing_slash_is_trimmed() {
        let mut vars = base_vars();
        vars.insert(
            "JWT_ISSUER_URL".to_string(),
            "https://idp.example.com/tenant/".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwt_issuer_url, "https://idp.example.com/tenant");
    }

    #[test]
    fn test_missing_required_vars() {
        for name in ["JWT_ISSUER_URL", "JWT_CLIENT_ID", "AGENT_ID", "AGENT_ALIAS_ID"] {
            let mut vars = base_vars();
            vars.remove(name);

            let err = Config::from_vars(&vars).unwrap_err();
            assert!(
                matches!(&err, ConfigError::MissingEnvVar(var) if var == name),
                "expected MissingEnvVar({name}), got {err:?}"
            );
        }
    }

    #[test]
    fn test_blank_required_var_is_missing() {
        let mut vars = base_vars();
        vars.insert("JWT_CLIENT_ID".to_string(), "   ".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_clock_skew_validation() {
        for bad in ["0", "-5", "abc", "601"] {
            let mut vars = base_vars();
            vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), bad.to_string());

            assert!(
                matches!(
                    Config::from_vars(&vars),
                    Err(ConfigError::InvalidJwtClockSkew(_))
                ),
                "clock skew {bad} should be rejected"
            );
        }

        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());
        assert_eq!(
            Config::from_vars(&vars).unwrap().jwt_clock_skew,
            MAX_CLOCK_SKEW
        );
    }

    #[test]
    fn test_duration_validation() {
        for name in [
            "JWKS_CACHE_TTL_SECONDS",
            "JWKS_FETCH_TIMEOUT_SECONDS",
            "AGENT_TIMEOUT_SECONDS",
        ] {
            for bad in ["0", "ten"] {
                let mut vars = base_vars();
                vars.insert(name.to_string(), bad.to_string());

                let err = Config::from_vars(&vars).unwrap_err();
                assert!(
                    matches!(&err, ConfigError::InvalidDuration(msg) if msg.contains(name)),
                    "{name}={bad} should be rejected, got {err:?}"
                );
            }
        }
    }
}
