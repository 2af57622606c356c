//! Runs the guard against a real JWKS endpoint served over HTTP.
mod common;

use std::net::SocketAddr;

use anyhow::Result;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tower::util::ServiceExt; // for `oneshot`

use coffee_shop::auth::{AuthConfig, AuthGuard};
use coffee_shop::{create_app, create_app_with_guard};
use common::{fixture_jwks, migrated_pool, token_for, AUDIENCE, BARISTA, ISSUER};

async fn serve_jwks() -> Result<SocketAddr> {
    let jwks = fixture_jwks();
    let router = Router::new().route(
        "/.well-known/jwks.json",
        get(move || {
            let jwks = jwks.clone();
            async move { Json(jwks) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(addr)
}

async fn detail_status(app: Router, token: &str) -> Result<(StatusCode, serde_json::Value)> {
    let req = axum::http::Request::builder()
        .uri("/drinks-detail")
        .header("authorization", format!("Bearer {token}"))
        .body(axum::body::Body::empty())?;

    let resp = app.oneshot(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 10_485_760).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn guard_configured_from_env_fetches_published_keys() -> Result<()> {
    let addr = serve_jwks().await?;
    let dir = tempfile::tempdir()?;
    let pool = migrated_pool(&dir).await?;

    std::env::set_var("AUTH_ISSUER", ISSUER);
    std::env::set_var("AUTH_AUDIENCE", AUDIENCE);
    std::env::set_var("AUTH_JWKS_URL", format!("http://{addr}/.well-known/jwks.json"));
    std::env::remove_var("AUTH_ALGORITHM");
    let app = create_app(pool).await?;

    // Authorized, and the menu is empty.
    let (status, body) = detail_status(app, &token_for(BARISTA)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    Ok(())
}

#[tokio::test]
async fn unreachable_key_endpoint_is_unavailable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = migrated_pool(&dir).await?;

    // Port 9 (discard) on loopback is not served in the test environment.
    let config = AuthConfig::new(ISSUER, AUDIENCE, "http://127.0.0.1:9/.well-known/jwks.json");
    let app = create_app_with_guard(pool, AuthGuard::from_config(&config)?);

    let (status, body) = detail_status(app, &token_for(BARISTA)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "key_provider_unavailable");

    Ok(())
}
