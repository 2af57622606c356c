use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

use crate::errors::AppError;

const DEFAULT_ALGORITHM: &str = "RS256";
const DEFAULT_JWKS_TIMEOUT_SECS: u64 = 5;
const DEFAULT_JWKS_TTL_SECS: u64 = 3600;

/// Settings of the trusted token issuer, read once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_url: String,
    pub algorithm: Algorithm,
    pub jwks_timeout: Duration,
    pub jwks_ttl: Duration,
}

impl AuthConfig {
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        jwks_url: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            jwks_url: jwks_url.into(),
            algorithm: Algorithm::RS256,
            jwks_timeout: Duration::from_secs(DEFAULT_JWKS_TIMEOUT_SECS),
            jwks_ttl: Duration::from_secs(DEFAULT_JWKS_TTL_SECS),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let issuer = std::env::var("AUTH_ISSUER")
            .map_err(|_| AppError::configuration("AUTH_ISSUER not set"))?;
        let audience = std::env::var("AUTH_AUDIENCE")
            .map_err(|_| AppError::configuration("AUTH_AUDIENCE not set"))?;
        let jwks_url = std::env::var("AUTH_JWKS_URL").unwrap_or_else(|_| default_jwks_url(&issuer));

        let algorithm =
            std::env::var("AUTH_ALGORITHM").unwrap_or_else(|_| DEFAULT_ALGORITHM.to_string());
        let algorithm = parse_algorithm(&algorithm)?;

        let jwks_timeout = secs_from_env("AUTH_JWKS_TIMEOUT_SECS", DEFAULT_JWKS_TIMEOUT_SECS)?;
        let jwks_ttl = secs_from_env("AUTH_JWKS_TTL_SECS", DEFAULT_JWKS_TTL_SECS)?;

        Ok(Self {
            issuer,
            audience,
            jwks_url,
            algorithm,
            jwks_timeout,
            jwks_ttl,
        })
    }
}

fn default_jwks_url(issuer: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
}

/// Only asymmetric algorithms can be trusted: a shared-secret algorithm would
/// let anyone holding the published key mint tokens.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, AppError> {
    let algorithm = Algorithm::from_str(name).map_err(|_| {
        AppError::configuration(format!("AUTH_ALGORITHM '{name}' is not a known algorithm"))
    })?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(AppError::configuration(format!(
                "AUTH_ALGORITHM '{name}' is symmetric; an asymmetric algorithm is required"
            )))
        }
        other => Ok(other),
    }
}

fn secs_from_env(var: &str, default: u64) -> Result<Duration, AppError> {
    std::env::var(var)
        .map(|val| val.parse::<u64>())
        .unwrap_or(Ok(default))
        .map(Duration::from_secs)
        .map_err(|_| AppError::configuration(format!("{var} must be a whole number of seconds")))
}
