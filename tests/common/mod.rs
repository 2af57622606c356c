//! Shared setup for the HTTP-level tests: a migrated temp database, a guard
//! backed by the fixture key set, and token minting helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use coffee_shop::auth::{AuthGuard, KeyProvider, KeySource, TokenVerifier};
use coffee_shop::create_app_with_guard;

pub const ISSUER: &str = "https://issuer.example.com/";
pub const AUDIENCE: &str = "drinks";
pub const TRUSTED_KID: &str = "trusted-key-1";

pub const MANAGER: &[&str] = &["get:drinks-detail", "post:drinks", "patch:drinks", "delete:drinks"];
pub const BARISTA: &[&str] = &["get:drinks-detail"];

const TRUSTED_PEM: &[u8] = include_bytes!("../fixtures/trusted_key.pem");
const ROGUE_PEM: &[u8] = include_bytes!("../fixtures/rogue_key.pem");

pub fn fixture_jwks() -> JwkSet {
    serde_json::from_str(include_str!("../fixtures/jwks.json")).expect("fixture jwks parses")
}

/// Serves the fixture key set and counts fetches.
pub struct FixtureKeySource {
    set: JwkSet,
    fetches: AtomicUsize,
}

impl FixtureKeySource {
    pub fn new() -> Self {
        Self {
            set: fixture_jwks(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for FixtureKeySource {
    async fn fetch(&self) -> Result<JwkSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.set.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub keys: Arc<FixtureKeySource>,
    // keeps the database file alive for the duration of the test
    _dir: TempDir,
}

pub async fn migrated_pool(dir: &TempDir) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrations = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations).await?;
    migrator.run(&pool).await?;

    Ok(pool)
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let pool = migrated_pool(&dir).await?;

    let keys = Arc::new(FixtureKeySource::new());
    let provider =
        KeyProvider::new(keys.clone(), Duration::from_secs(3600), Duration::from_secs(5));
    let verifier = TokenVerifier::new(Arc::new(provider), ISSUER, AUDIENCE, Algorithm::RS256);
    let router = create_app_with_guard(pool.clone(), AuthGuard::new(verifier));

    Ok(TestApp {
        router,
        pool,
        keys,
        _dir: dir,
    })
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let authorization = token.map(|token| format!("Bearer {token}"));
        self.send_raw(method, uri, authorization.as_deref(), body).await
    }

    /// Send with a literal `Authorization` header value.
    pub async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            req = req.header("authorization", value);
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => req.body(Body::empty())?,
        };

        let resp = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };

        Ok((status, value))
    }

    pub async fn drink_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM drinks")
            .fetch_one(&self.pool)
            .await?)
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn claims_with(permissions: &[&str]) -> Value {
    json!({
        "iss": ISSUER,
        "sub": "auth0|tester",
        "aud": [AUDIENCE, "https://issuer.example.com/userinfo"],
        "exp": now() + 3600,
        "permissions": permissions,
    })
}

fn sign(claims: &Value, alg: Algorithm, kid: Option<&str>, key: &EncodingKey) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    jsonwebtoken::encode(&header, claims, key).expect("token encodes")
}

pub fn sign_trusted(claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(TRUSTED_PEM).expect("trusted key parses");
    sign(claims, Algorithm::RS256, Some(TRUSTED_KID), &key)
}

pub fn sign_rogue(claims: &Value, kid: &str) -> String {
    let key = EncodingKey::from_rsa_pem(ROGUE_PEM).expect("rogue key parses");
    sign(claims, Algorithm::RS256, Some(kid), &key)
}

pub fn sign_hs256(claims: &Value, secret: &[u8]) -> String {
    sign(claims, Algorithm::HS256, Some(TRUSTED_KID), &EncodingKey::from_secret(secret))
}

pub fn token_for(permissions: &[&str]) -> String {
    sign_trusted(&claims_with(permissions))
}

pub fn espresso_tonic() -> Value {
    json!({
        "title": "Espresso Tonic",
        "recipe": [
            {"color": "#f5f5dc", "name": "tonic", "parts": 3},
            {"color": "#3b2f2f", "name": "espresso", "parts": 1}
        ]
    })
}
