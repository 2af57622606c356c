use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, patch};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, AuthGuard};
use crate::errors::AppError;
use crate::routes::{drinks, health};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub guard: Arc<AuthGuard>,
}

impl AppState {
    pub fn new(pool: SqlitePool, guard: AuthGuard) -> Self {
        Self {
            pool,
            guard: Arc::new(guard),
        }
    }
}

/// Build the router with a guard configured from the environment.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AuthConfig::from_env()?;
    let guard = AuthGuard::from_config(&config)
        .map_err(|err| AppError::configuration(format!("cannot build JWKS client: {err:#}")))?;

    tracing::info!(
        issuer = %config.issuer,
        audience = %config.audience,
        jwks_url = %config.jwks_url,
        "authorization configured"
    );

    Ok(create_app_with_guard(pool, guard))
}

pub fn create_app_with_guard(pool: SqlitePool, guard: AuthGuard) -> Router {
    let state = AppState::new(pool, guard);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/drinks", get(drinks::list_drinks).post(drinks::create_drink))
        .route("/drinks-detail", get(drinks::list_drinks_detail))
        .route("/drinks/:id", patch(drinks::update_drink).delete(drinks::delete_drink))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
