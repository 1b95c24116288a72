//! JWKS client for fetching and caching the access issuer's public keys.
//!
//! The JWKS (JSON Web Key Set) document is read through a shared key-value
//! store under a fixed cache key. On a miss, an unreadable entry, or an entry
//! older than the cache TTL, the document is fetched from the issuer and the
//! cache entry is overwritten wholesale.
//!
//! # Concurrency
//!
//! Refills are single-flight per JWKS URI: one client exists per URI and
//! holds a refresh mutex. A request that misses the cache takes the mutex,
//! re-reads the cache, and only fetches if the entry is still missing, so
//! concurrent cold-start requests coalesce into one upstream fetch.
//!
//! # Deadlines
//!
//! Every upstream fetch runs under an explicit deadline and surfaces
//! [`AuthError::FetchTimeout`] when it expires.

use crate::auth::AuthError;
use crate::config::{
    DEFAULT_JWKS_CACHE_KEY, DEFAULT_JWKS_CACHE_TTL_SECONDS, DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
};
use crate::observability::metrics;
use common::kv::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::instrument;

/// How far in the future a shared entry's `fetched_at` may lie before it is
/// treated as stale.
const MAX_FETCHED_AT_SKEW_SECONDS: i64 = 60;

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (always "RSA" for RS256).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: String,

    /// RSA modulus (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

/// JWKS document as published by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwksDocument {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

impl JwksDocument {
    /// Find the key with the given ID, searching the whole set.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }
}

/// Envelope stored in the key-value cache.
///
/// `fetched_at` is wall-clock Unix seconds so that any instance sharing the
/// store can judge freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksCacheEntry {
    /// When the document was fetched (Unix epoch seconds).
    pub fetched_at: i64,

    /// The cached document.
    pub jwks: JwksDocument,
}

impl JwksCacheEntry {
    /// Fresh while younger than `ttl` and not stamped beyond the allowed
    /// future skew.
    fn is_fresh(&self, ttl: Duration, now: i64) -> bool {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let age = now.saturating_sub(self.fetched_at);
        age >= -MAX_FETCHED_AT_SKEW_SECONDS && age < ttl_secs
    }
}

/// JWKS client reading through a shared key-value cache.
pub struct JwksClient {
    /// URL of the JWKS document.
    jwks_uri: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Shared key-value cache.
    store: Arc<dyn KvStore>,

    /// Fixed cache key for the document.
    cache_key: String,

    /// How long a cached document is considered fresh.
    cache_ttl: Duration,

    /// Deadline for one upstream fetch.
    fetch_timeout: Duration,

    /// Serializes refills so concurrent misses share one fetch.
    refresh_lock: Mutex<()>,
}

impl JwksClient {
    /// Create a new JWKS client with default cache key, TTL and deadline.
    ///
    /// # Arguments
    ///
    /// * `jwks_uri` - URL of the issuer's JWKS document
    /// * `store` - Key-value cache shared with other requests/instances
    pub fn new(jwks_uri: String, store: Arc<dyn KvStore>) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "academy.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_uri,
            http_client,
            store,
            cache_key: DEFAULT_JWKS_CACHE_KEY.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
            fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Use a different cache key.
    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = cache_key.into();
        self
    }

    /// Use a different freshness window.
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Use a different upstream fetch deadline.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// URL of the JWKS document.
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Get a JWK by key ID.
    ///
    /// Reads the cached key set (fetching it when needed) and searches every
    /// key in it. A fresh cached set that lacks the key is NOT refetched.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` if no key has this ID
    /// - `AuthError::FetchError` / `AuthError::FetchTimeout` if the set had to
    ///   be fetched and could not be
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        let key_set = self.key_set().await?;

        match key_set.find(kid) {
            Some(key) => Ok(key.clone()),
            None => {
                tracing::debug!(target: "academy.auth.jwks", kid = %kid, "Key not found in JWKS");
                Err(AuthError::KeyNotFound)
            }
        }
    }

    /// Get the current key set, from cache when fresh.
    ///
    /// # Errors
    ///
    /// `AuthError::FetchError` or `AuthError::FetchTimeout` when a fetch was
    /// required and failed.
    #[instrument(skip(self))]
    pub async fn key_set(&self) -> Result<JwksDocument, AuthError> {
        if let Some(cached) = self.read_cache().await {
            return Ok(cached);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another request may have refilled the cache while we waited
        if let Some(cached) = self.read_cache().await {
            return Ok(cached);
        }

        let jwks = self.fetch_jwks().await?;
        self.write_cache(&jwks).await;

        Ok(jwks)
    }

    /// Read a fresh document from the cache. Any failure counts as a miss.
    async fn read_cache(&self) -> Option<JwksDocument> {
        let bytes = match self.store.get(&self.cache_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                metrics::record_jwks_cache("miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "academy.auth.jwks", error = %e, "JWKS cache read failed, treating as miss");
                metrics::record_jwks_cache("error");
                return None;
            }
        };

        let entry: JwksCacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(target: "academy.auth.jwks", error = %e, "JWKS cache entry unreadable, treating as miss");
                metrics::record_jwks_cache("error");
                return None;
            }
        };

        if !entry.is_fresh(self.cache_ttl, chrono::Utc::now().timestamp()) {
            tracing::debug!(target: "academy.auth.jwks", fetched_at = entry.fetched_at, "JWKS cache entry stale");
            metrics::record_jwks_cache("stale");
            return None;
        }

        tracing::debug!(target: "academy.auth.jwks", "JWKS cache hit");
        metrics::record_jwks_cache("hit");
        Some(entry.jwks)
    }

    /// Overwrite the cache entry. Failures are logged, not fatal.
    async fn write_cache(&self, jwks: &JwksDocument) {
        let entry = JwksCacheEntry {
            fetched_at: chrono::Utc::now().timestamp(),
            jwks: jwks.clone(),
        };

        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(target: "academy.auth.jwks", error = %e, "Failed to encode JWKS cache entry");
                return;
            }
        };

        if let Err(e) = self.store.put(&self.cache_key, bytes).await {
            tracing::warn!(target: "academy.auth.jwks", error = %e, "Failed to store JWKS in cache");
        }
    }

    /// Fetch the document from the issuer under the fetch deadline.
    #[instrument(skip(self))]
    async fn fetch_jwks(&self) -> Result<JwksDocument, AuthError> {
        tracing::debug!(target: "academy.auth.jwks", url = %self.jwks_uri, "Fetching JWKS");
        let start = Instant::now();

        let result = match tokio::time::timeout(self.fetch_timeout, self.fetch_jwks_inner()).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    target: "academy.auth.jwks",
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "JWKS fetch exceeded deadline"
                );
                Err(AuthError::FetchTimeout)
            }
        };

        let status = match &result {
            Ok(_) => "success",
            Err(AuthError::FetchTimeout) => "timeout",
            Err(_) => "error",
        };
        metrics::record_jwks_fetch(status, start.elapsed());

        if let Ok(jwks) = &result {
            tracing::info!(
                target: "academy.auth.jwks",
                key_count = jwks.keys.len(),
                "JWKS cache refreshed"
            );
        }

        result
    }

    async fn fetch_jwks_inner(&self) -> Result<JwksDocument, AuthError> {
        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "academy.auth.jwks", error = %e, "Failed to fetch JWKS");
                AuthError::FetchError("JWKS endpoint unreachable".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "academy.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::FetchError(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        response.json::<JwksDocument>().await.map_err(|e| {
            tracing::error!(target: "academy.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::FetchError("JWKS document malformed".to_string())
        })
    }
}
