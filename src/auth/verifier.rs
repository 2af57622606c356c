use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use serde_json::Value;

use super::error::AuthError;
use super::keys::{KeyProvider, SigningKey};

/// The `aud` claim: a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(value) => value == audience,
            Audience::Multiple(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// The authenticated payload of a bearer token.
///
/// Only [`TokenVerifier`] can build one, so holding a `VerifiedClaims` means the
/// signature, expiry, issuer and audience have all been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    issuer: String,
    audience: Audience,
    expires_at: i64,
    subject: Option<String>,
    permissions: Option<HashSet<String>>,
}

impl VerifiedClaims {
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    /// Expiry as whole-second Unix time.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// `None` when the token carried no `permissions` claim at all.
    pub fn permissions(&self) -> Option<&HashSet<String>> {
        self.permissions.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn with_permissions(names: &[&str]) -> Self {
        Self {
            permissions: Some(names.iter().map(|name| name.to_string()).collect()),
            ..Self::without_permissions_claim()
        }
    }

    #[cfg(test)]
    pub(crate) fn without_permissions_claim() -> Self {
        Self {
            issuer: super::testing::ISSUER.to_string(),
            audience: Audience::Single(super::testing::AUDIENCE.to_string()),
            expires_at: super::testing::now() + 3600,
            subject: Some("auth0|test".to_string()),
            permissions: None,
        }
    }
}

#[derive(Deserialize)]
struct UnverifiedHeader {
    alg: Option<String>,
    kid: Option<String>,
}

/// Claims as signed. Each one is typed by its own check so that a wrongly
/// typed claim fails that check rather than decoding.
#[derive(Deserialize)]
struct RawClaims {
    iss: Option<Value>,
    sub: Option<Value>,
    aud: Option<Value>,
    exp: Option<Value>,
    permissions: Option<Value>,
}

/// A NumericDate truncated to whole seconds.
fn numeric_date(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|secs| secs.is_finite())
            .map(|secs| secs.floor() as i64)
    })
}

/// `None` unless the claim is an array of strings.
fn permission_set(value: Value) -> Option<HashSet<String>> {
    let Value::Array(items) = value else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Checks bearer tokens against the trusted issuer's published keys.
pub struct TokenVerifier {
    keys: Arc<KeyProvider>,
    issuer: String,
    audience: String,
    algorithm: Algorithm,
}

impl TokenVerifier {
    pub fn new(
        keys: Arc<KeyProvider>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithm: Algorithm,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm,
        }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp()).await
    }

    /// Verify `token` as of `now` (whole-second Unix time).
    ///
    /// Checks run in a fixed order and the first failure wins: structure,
    /// algorithm, key lookup, key algorithm, signature, expiry, issuer,
    /// audience.
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedClaims, AuthError> {
        let header = unverified_header(token)?;

        let alg = header.alg.as_deref().ok_or(AuthError::UnsupportedAlgorithm)?;
        if Algorithm::from_str(alg).ok() != Some(self.algorithm) {
            tracing::info!(alg = %alg, "rejecting token signed with untrusted algorithm");
            return Err(AuthError::UnsupportedAlgorithm);
        }

        let kid = header.kid.ok_or(AuthError::MalformedToken)?;
        let key = self.keys.key(&kid).await?;
        if key.algorithm != self.algorithm {
            tracing::info!(
                kid = %kid,
                key_alg = ?key.algorithm,
                "signing key is not published for the trusted algorithm"
            );
            return Err(AuthError::InvalidSignature);
        }

        let claims = self.check_signature(token, &key)?;

        let expires_at = match claims.exp.as_ref().and_then(numeric_date) {
            Some(exp) if exp > now => exp,
            _ => return Err(AuthError::TokenExpired),
        };

        let issuer = match claims.iss {
            Some(Value::String(iss)) if iss == self.issuer => iss,
            _ => return Err(AuthError::InvalidIssuer),
        };

        let audience = claims
            .aud
            .and_then(|aud| serde_json::from_value::<Audience>(aud).ok())
            .filter(|aud| aud.contains(&self.audience))
            .ok_or(AuthError::InvalidAudience)?;

        let subject = match claims.sub {
            Some(Value::String(sub)) => Some(sub),
            _ => None,
        };

        Ok(VerifiedClaims {
            issuer,
            audience,
            expires_at,
            subject,
            permissions: claims.permissions.and_then(permission_set),
        })
    }

    fn check_signature(&self, token: &str, key: &SigningKey) -> Result<RawClaims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        // Temporal and identity claims are checked afterwards, without leeway.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<RawClaims>(token, &key.key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidEcdsaKey => {
                    tracing::info!(kid = %key.kid, error = %err, "token signature rejected");
                    AuthError::InvalidSignature
                }
                _ => {
                    tracing::info!(error = %err, "token payload could not be decoded");
                    AuthError::MalformedToken
                }
            })
    }
}

fn unverified_header(token: &str) -> Result<UnverifiedHeader, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        return Err(AuthError::MalformedToken);
    };

    let header = URL_SAFE_NO_PAD.decode(header).map_err(|_| AuthError::MalformedToken)?;
    for segment in [payload, signature] {
        URL_SAFE_NO_PAD.decode(segment).map_err(|_| AuthError::MalformedToken)?;
    }

    serde_json::from_slice(&header).map_err(|_| AuthError::MalformedToken)
}
