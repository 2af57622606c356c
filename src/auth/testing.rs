//! Fixtures shared by the authorization unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use super::keys::{KeyProvider, KeySource};
use super::verifier::TokenVerifier;

pub const ISSUER: &str = "https://issuer.example.com/";
pub const AUDIENCE: &str = "drinks";
pub const TRUSTED_KID: &str = "trusted-key-1";

const TRUSTED_PEM: &[u8] = include_bytes!("../../tests/fixtures/trusted_key.pem");
const ROGUE_PEM: &[u8] = include_bytes!("../../tests/fixtures/rogue_key.pem");

pub fn fixture_jwks() -> JwkSet {
    fixture_jwks_with(|_| {})
}

/// The fixture key set after `edit` has been applied to its JSON form.
pub fn fixture_jwks_with(edit: impl FnOnce(&mut Value)) -> JwkSet {
    let mut jwks: Value =
        serde_json::from_str(include_str!("../../tests/fixtures/jwks.json")).unwrap();
    edit(&mut jwks);
    serde_json::from_value(jwks).unwrap()
}

/// Serves a fixed key set and counts how often it was asked.
pub struct StaticKeySource {
    set: JwkSet,
    fetches: AtomicUsize,
}

impl StaticKeySource {
    pub fn new(set: JwkSet) -> Self {
        Self {
            set,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> anyhow::Result<JwkSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.set.clone())
    }
}

pub fn verifier(source: Arc<StaticKeySource>) -> TokenVerifier {
    let keys = KeyProvider::new(source, Duration::from_secs(3600), Duration::from_secs(5));
    TokenVerifier::new(Arc::new(keys), ISSUER, AUDIENCE, Algorithm::RS256)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims a well-behaved issuer would put in a token for `permissions`.
pub fn claims_with(permissions: &[&str]) -> Value {
    json!({
        "iss": ISSUER,
        "sub": "auth0|barista",
        "aud": [AUDIENCE, "https://issuer.example.com/userinfo"],
        "exp": now() + 3600,
        "permissions": permissions,
    })
}

fn header(alg: Algorithm, kid: Option<&str>) -> Header {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    header
}

pub fn sign_trusted(claims: &Value) -> String {
    sign_rs256(claims, Some(TRUSTED_KID), TRUSTED_PEM)
}

pub fn sign_rogue(claims: &Value, kid: &str) -> String {
    sign_rs256(claims, Some(kid), ROGUE_PEM)
}

pub fn sign_rs256(claims: &Value, kid: Option<&str>, pem: &[u8]) -> String {
    let key = EncodingKey::from_rsa_pem(pem).unwrap();
    jsonwebtoken::encode(&header(Algorithm::RS256, kid), claims, &key).unwrap()
}

pub fn sign_hs256(claims: &Value, secret: &[u8]) -> String {
    let key = EncodingKey::from_secret(secret);
    jsonwebtoken::encode(&header(Algorithm::HS256, Some(TRUSTED_KID)), claims, &key).unwrap()
}

/// Assemble a token from raw parts without signing it.
pub fn unsigned(header: &Value, claims: &Value, signature: &str) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        signature
    )
}
