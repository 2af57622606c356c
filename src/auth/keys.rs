use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;

use super::error::AuthError;

/// Where the issuer's published key set comes from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<JwkSet>;
}

/// Fetches the key set from the issuer's JWKS endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build JWKS http client")?;

        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> anyhow::Result<JwkSet> {
        tracing::debug!(url = %self.url, "fetching JWKS");

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .context("JWKS request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("JWKS fetch failed with status {status}");
        }

        response.json::<JwkSet>().await.context("failed to parse JWKS")
    }
}

/// A public key published by the issuer.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub algorithm: Algorithm,
    pub key: DecodingKey,
    pub fetched_at: Instant,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}

/// The algorithm a JWK verifies.
///
/// A declared `alg` wins, provided it fits the key type; otherwise the key
/// parameters decide. Symmetric (`oct`) keys are never usable for
/// verification here.
pub fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    let fits = |algorithm: &Algorithm| match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            algorithm,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(_) => {
            matches!(algorithm, Algorithm::ES256 | Algorithm::ES384)
        }
        AlgorithmParameters::OctetKeyPair(_) => *algorithm == Algorithm::EdDSA,
        AlgorithmParameters::OctetKey(_) => false,
    };

    match &jwk.common.key_algorithm {
        Some(declared) => declared_algorithm(declared).filter(fits),
        None => key_type_algorithm(&jwk.algorithm),
    }
}

fn declared_algorithm(declared: &KeyAlgorithm) -> Option<Algorithm> {
    match declared {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        // HMAC and key-encryption algorithms
        _ => None,
    }
}

fn key_type_algorithm(params: &AlgorithmParameters) -> Option<Algorithm> {
    match params {
        AlgorithmParameters::RSA(_) => Some(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(params) => match params.curve {
            EllipticCurve::P256 => Some(Algorithm::ES256),
            EllipticCurve::P384 => Some(Algorithm::ES384),
            _ => None,
        },
        AlgorithmParameters::OctetKeyPair(_) => Some(Algorithm::EdDSA),
        AlgorithmParameters::OctetKey(_) => None,
    }
}

/// Caches the issuer's signing keys by `kid`.
///
/// Keys are fetched lazily: only a lookup that misses (or finds an entry older
/// than the TTL) triggers a fetch. No lock is held while fetching, and each
/// fetch result is merged in under a single write lock, so concurrent refreshes
/// converge on the union of what they fetched.
pub struct KeyProvider {
    source: Arc<dyn KeySource>,
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl KeyProvider {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            source,
            keys: RwLock::new(HashMap::new()),
            ttl,
            fetch_timeout,
        }
    }

    pub async fn key(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        tracing::debug!(kid = %kid, "signing key not cached, refreshing key set");
        let fetched = self.fetch().await?;
        let found = fetched.get(kid).cloned();

        {
            let mut keys = self.keys.write().await;
            keys.retain(|_, key| key.fetched_at.elapsed() < self.ttl);
            keys.extend(fetched);
        }

        found.ok_or_else(|| {
            tracing::info!(kid = %kid, "signing key not published by issuer");
            AuthError::UnknownSigningKey
        })
    }

    async fn cached(&self, kid: &str) -> Option<Arc<SigningKey>> {
        let keys = self.keys.read().await;
        keys.get(kid)
            .filter(|key| key.fetched_at.elapsed() < self.ttl)
            .cloned()
    }

    async fn fetch(&self) -> Result<HashMap<String, Arc<SigningKey>>, AuthError> {
        let jwk_set = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(Ok(set)) => set,
            Ok(Err(err)) => {
                tracing::warn!(error = %format!("{err:#}"), "key provider unavailable");
                return Err(AuthError::KeyProviderUnavailable);
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.fetch_timeout, "key provider timed out");
                return Err(AuthError::KeyProviderUnavailable);
            }
        };

        let fetched_at = Instant::now();
        let mut keys = HashMap::new();
        for jwk in &jwk_set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                tracing::warn!("JWK missing kid, skipping");
                continue;
            };
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                tracing::warn!(kid = %kid, "JWK is published for encryption, skipping");
                continue;
            }
            let Some(algorithm) = jwk_algorithm(jwk) else {
                tracing::warn!(kid = %kid, "JWK cannot verify asymmetric signatures, skipping");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(
                        kid.clone(),
                        Arc::new(SigningKey {
                            kid,
                            algorithm,
                            key,
                            fetched_at,
                        }),
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        kid = %kid,
                        error = %err,
                        "failed to build decoding key, skipping"
                    )
                }
            }
        }

        tracing::debug!(count = keys.len(), "key set refreshed");
        Ok(keys)
    }
}
