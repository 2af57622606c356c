use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::config::AuthConfig;
use super::error::AuthError;
use super::evaluator::check_permission;
use super::extractor::bearer_token;
use super::keys::{HttpKeySource, KeyProvider};
use super::verifier::{TokenVerifier, VerifiedClaims};
use crate::app::AppState;
use crate::errors::AppError;

/// Proof that a request passed every authorization check.
#[derive(Debug, Clone)]
pub struct AuthorizedContext {
    claims: VerifiedClaims,
}

impl AuthorizedContext {
    pub fn claims(&self) -> &VerifiedClaims {
        &self.claims
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.subject()
    }
}

/// Single entry point every protected operation goes through.
///
/// One pass extracts the bearer token, verifies it (resolving the signing key
/// on demand) and checks the required permission. The first failing step ends
/// the pass; nothing is retried.
pub struct AuthGuard {
    verifier: TokenVerifier,
}

impl AuthGuard {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }

    /// Build a guard that fetches keys from the configured JWKS endpoint.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let source = HttpKeySource::new(config.jwks_url.clone(), config.jwks_timeout)?;
        let keys = KeyProvider::new(Arc::new(source), config.jwks_ttl, config.jwks_timeout);
        let verifier = TokenVerifier::new(
            Arc::new(keys),
            config.issuer.clone(),
            config.audience.clone(),
            config.algorithm,
        );

        Ok(Self::new(verifier))
    }

    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        required: &str,
    ) -> Result<AuthorizedContext, AuthError> {
        let token = bearer_token(headers).map_err(|err| rejected(err, required))?;

        let claims = self
            .verifier
            .verify(token)
            .await
            .map_err(|err| rejected(err, required))?;

        check_permission(&claims, required).map_err(|err| rejected(err, required))?;

        tracing::debug!(subject = ?claims.subject(), permission = %required, "request authorized");
        Ok(AuthorizedContext { claims })
    }

    /// Run `operation` only if the request holds `required`.
    pub async fn protect<F, Fut, T>(
        &self,
        headers: &HeaderMap,
        required: &str,
        operation: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(AuthorizedContext) -> Fut,
        Fut: Future<Output = T>,
    {
        let context = self.authorize(headers, required).await?;
        Ok(operation(context).await)
    }
}

fn rejected(err: AuthError, required: &str) -> AuthError {
    tracing::info!(
        stage = ?err.stage(),
        code = err.code(),
        permission = %required,
        "request rejected"
    );
    err
}

/// A permission name attached to a handler through its signature.
pub trait RequiredPermission: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Extractor that authorizes the request for permission `P` before the
/// handler body runs.
#[derive(Debug, Clone)]
pub struct Authorized<P> {
    pub context: AuthorizedContext,
    _permission: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P: RequiredPermission> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let context = state.guard.authorize(&parts.headers, P::NAME).await?;

        Ok(Authorized {
            context,
            _permission: PhantomData,
        })
    }
}
