//! Key set cache for the identity provider's public keys.
//!
//! Keys are fetched from `{issuer}/.well-known/jwks.json` and cached per
//! issuer with a TTL (1 hour by default).
//!
//! # Behavior
//!
//! - A fresh entry (age < TTL) is returned without any network call
//! - A missing or stale entry triggers a fetch; success replaces the entry
//! - A failed fetch falls back to the stale entry when one exists
//! - A failed fetch with nothing cached is `AuthError::KeySetUnavailable`
//!
//! Entries are immutable snapshots behind `Arc`. A refresh swaps the whole
//! entry, so concurrent refreshes for one issuer are last-writer-wins.

use crate::errors::AuthError;
use crate::observability::metrics::{record_jwks_fetch, record_jwks_lookup, KeySetLookup};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default cache TTL in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Default timeout for a single key set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from the discovery endpoint.
///
/// RSA keys carry `n`/`e`; Ed25519 keys carry `crv`/`x`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "OKP").
    pub kty: String,

    /// Key ID. Keys without one cannot be selected and are dropped.
    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name ("Ed25519" for OKP keys).
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Keys of one issuer, indexed by key ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: HashMap<String, Jwk>,
}

impl KeySet {
    /// Index keys by `kid`, skipping keys without one.
    pub fn from_keys(keys: Vec<Jwk>) -> Self {
        let keys = keys
            .into_iter()
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key)))
            .collect();
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<JwksResponse> for KeySet {
    fn from(response: JwksResponse) -> Self {
        Self::from_keys(response.keys)
    }
}

/// A cached key set and when it was fetched.
#[derive(Debug)]
pub struct CachedKeySet {
    pub key_set: Arc<KeySet>,
    pub fetched_at: Instant,
}

impl CachedKeySet {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// In-memory key set cache keyed by issuer URL.
///
/// Entries are never evicted; a stale entry is the fallback when a refresh
/// fails.
#[derive(Debug, Default)]
pub struct KeySetCache {
    entries: RwLock<HashMap<String, Arc<CachedKeySet>>>,
}

impl KeySetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry for `issuer`, fresh or not.
    pub async fn get(&self, issuer: &str) -> Option<Arc<CachedKeySet>> {
        self.entries.read().await.get(issuer).cloned()
    }

    /// Replace the entry for `issuer`.
    pub async fn put(&self, issuer: &str, key_set: Arc<KeySet>, fetched_at: Instant) {
        let entry = Arc::new(CachedKeySet {
            key_set,
            fetched_at,
        });
        self.entries.write().await.insert(issuer.to_string(), entry);
    }
}

/// Source of key sets. The production implementation is
/// [`HttpKeySetFetcher`]; tests substitute their own.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Fetch the current key set for `issuer`.
    async fn fetch(&self, issuer: &str) -> Result<KeySet, AuthError>;
}

/// Fetches `{issuer}/.well-known/jwks.json` over HTTP.
pub struct HttpKeySetFetcher {
    http_client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gateway.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { http_client }
    }

    /// Discovery URL for an issuer.
    pub fn jwks_url(issuer: &str) -> String {
        format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
    }
}

impl Default for HttpKeySetFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    #[instrument(skip(self), fields(issuer = %issuer))]
    async fn fetch(&self, issuer: &str) -> Result<KeySet, AuthError> {
        let url = Self::jwks_url(issuer);
        tracing::debug!(target: "gateway.auth.jwks", url = %url, "Fetching JWKS");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to fetch JWKS");
            AuthError::KeySetUnavailable(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gateway.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeySetUnavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gateway.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeySetUnavailable(format!("invalid document: {e}"))
        })?;

        Ok(KeySet::from(jwks))
    }
}

/// Key set source used by the validator: a [`KeySetCache`] in front of a
/// [`KeySetFetcher`].
pub struct JwksClient {
    cache: KeySetCache,
    fetcher: Arc<dyn KeySetFetcher>,
    ttl: Duration,
}

impl JwksClient {
    /// Create a client with the default 1 hour TTL.
    pub fn new(fetcher: Arc<dyn KeySetFetcher>) -> Self {
        Self::with_ttl(fetcher, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a client with a custom TTL.
    pub fn with_ttl(fetcher: Arc<dyn KeySetFetcher>, ttl: Duration) -> Self {
        Self {
            cache: KeySetCache::new(),
            fetcher,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key set for `issuer`, fetching when the cache has nothing fresh.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySetUnavailable` only when the fetch fails and
    /// nothing was ever cached for this issuer.
    #[instrument(skip(self), fields(issuer = %issuer))]
    pub async fn get_key_set(&self, issuer: &str) -> Result<Arc<KeySet>, AuthError> {
        let cached = self.cache.get(issuer).await;

        if let Some(entry) = cached.as_ref().filter(|entry| entry.is_fresh(self.ttl)) {
            tracing::debug!(target: "gateway.auth.jwks", "JWKS cache hit");
            record_jwks_lookup(KeySetLookup::Hit);
            return Ok(Arc::clone(&entry.key_set));
        }

        let start = Instant::now();
        let fetched = self.fetcher.fetch(issuer).await;
        record_jwks_fetch(fetched.is_ok(), start.elapsed());

        match (fetched, cached) {
            (Ok(key_set), _) => {
                let key_set = Arc::new(key_set);
                self.cache
                    .put(issuer, Arc::clone(&key_set), Instant::now())
                    .await;

                tracing::info!(
                    target: "gateway.auth.jwks",
                    key_count = key_set.len(),
                    "JWKS cache refreshed"
                );
                record_jwks_lookup(KeySetLookup::Fetched);
                Ok(key_set)
            }
            (Err(e), Some(stale)) => {
                tracing::warn!(
                    target: "gateway.auth.jwks",
                    error = %e,
                    age_secs = stale.age().as_secs(),
                    "JWKS refresh failed, serving stale key set"
                );
                record_jwks_lookup(KeySetLookup::Stale);
                Ok(Arc::clone(&stale.key_set))
            }
            (Err(e), None) => {
                tracing::error!(target: "gateway.auth.jwks", error = %e, "JWKS unavailable and nothing cached");
                record_jwks_lookup(KeySetLookup::Unavailable);
                Err(e)
            }
        }
    }
}
