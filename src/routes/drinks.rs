use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::auth::permissions::{DeleteDrinks, GetDrinksDetail, PatchDrinks, PostDrinks};
use crate::auth::{Authorized, BearerToken};
use crate::errors::{AppError, AppResult};
use crate::models::drink::{
    validate_recipe, validate_title, DbDrink, DeleteResponse, Drink, DrinkCreateRequest,
    DrinkResponse, DrinkShort, DrinkUpdateRequest, DrinksResponse,
};

#[utoipa::path(
    get,
    path = "/drinks",
    tag = "Drinks",
    responses(
        (status = 200, description = "Menu with recipe colours only", body = [DrinkShort]),
        (status = 401, description = "Missing or malformed bearer header"),
        (status = 404, description = "Menu is empty")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_drinks(
    State(state): State<AppState>,
    _bearer: BearerToken,
) -> AppResult<Json<DrinksResponse<DrinkShort>>> {
    let drinks = fetch_all(&state.pool).await?;

    Ok(Json(DrinksResponse {
        success: true,
        drinks: drinks.iter().map(Drink::short).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/drinks-detail",
    tag = "Drinks",
    responses(
        (status = 200, description = "Menu with full recipes", body = [Drink]),
        (status = 401, description = "Token missing or invalid"),
        (status = 403, description = "Requires get:drinks-detail"),
        (status = 404, description = "Menu is empty")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_drinks_detail(
    State(state): State<AppState>,
    _auth: Authorized<GetDrinksDetail>,
) -> AppResult<Json<DrinksResponse<Drink>>> {
    let drinks = fetch_all(&state.pool).await?;

    Ok(Json(DrinksResponse { success: true, drinks }))
}

#[utoipa::path(
    post,
    path = "/drinks",
    tag = "Drinks",
    request_body = DrinkCreateRequest,
    responses(
        (status = 200, description = "Drink created", body = DrinkResponse),
        (status = 403, description = "Requires post:drinks"),
        (status = 409, description = "Title already on the menu"),
        (status = 422, description = "Invalid title or recipe")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_drink(
    State(state): State<AppState>,
    auth: Authorized<PostDrinks>,
    payload: Result<Json<DrinkCreateRequest>, JsonRejection>,
) -> AppResult<Json<DrinkResponse>> {
    let Json(payload) = payload.map_err(json_rejection)?;

    let title = payload
        .title
        .as_deref()
        .ok_or_else(|| AppError::unprocessable("title is required"))
        .and_then(validate_title)?;
    let recipe = payload
        .recipe
        .ok_or_else(|| AppError::unprocessable("recipe is required"))?;
    validate_recipe(&recipe)?;

    let recipe_json = encode_recipe(&recipe)?;
    let id = sqlx::query("INSERT INTO drinks (title, recipe) VALUES (?, ?)")
        .bind(&title)
        .bind(&recipe_json)
        .execute(&state.pool)
        .await
        .map_err(|err| unique_title(err, &title))?
        .last_insert_rowid();

    tracing::info!(drink_id = id, subject = ?auth.context.subject(), "drink created");

    let drink = fetch_drink(&state.pool, id).await?;
    Ok(Json(DrinkResponse { success: true, drink }))
}

#[utoipa::path(
    patch,
    path = "/drinks/{id}",
    tag = "Drinks",
    params(("id" = i64, Path, description = "Drink id")),
    request_body = DrinkUpdateRequest,
    responses(
        (status = 200, description = "Drink updated", body = DrinkResponse),
        (status = 403, description = "Requires patch:drinks"),
        (status = 404, description = "Drink not found"),
        (status = 422, description = "Invalid title or recipe")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_drink(
    State(state): State<AppState>,
    auth: Authorized<PatchDrinks>,
    Path(id): Path<i64>,
    payload: Result<Json<DrinkUpdateRequest>, JsonRejection>,
) -> AppResult<Json<DrinkResponse>> {
    let Json(payload) = payload.map_err(json_rejection)?;
    let mut drink = fetch_drink(&state.pool, id).await?;

    if let Some(title) = payload.title.as_deref() {
        drink.title = validate_title(title)?;
    }
    if let Some(recipe) = payload.recipe {
        validate_recipe(&recipe)?;
        drink.recipe = recipe;
    }

    let recipe_json = encode_recipe(&drink.recipe)?;
    sqlx::query("UPDATE drinks SET title = ?, recipe = ? WHERE id = ?")
        .bind(&drink.title)
        .bind(&recipe_json)
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|err| unique_title(err, &drink.title))?;

    tracing::info!(drink_id = id, subject = ?auth.context.subject(), "drink updated");

    Ok(Json(DrinkResponse { success: true, drink }))
}

#[utoipa::path(
    delete,
    path = "/drinks/{id}",
    tag = "Drinks",
    params(("id" = i64, Path, description = "Drink id")),
    responses(
        (status = 200, description = "Drink deleted", body = DeleteResponse),
        (status = 403, description = "Requires delete:drinks"),
        (status = 404, description = "Drink not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_drink(
    State(state): State<AppState>,
    auth: Authorized<DeleteDrinks>,
    Path(id): Path<i64>,
) -> AppResult<Json<DeleteResponse>> {
    let affected = sqlx::query("DELETE FROM drinks WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("drink not found"));
    }

    tracing::info!(drink_id = id, subject = ?auth.context.subject(), "drink deleted");

    Ok(Json(DeleteResponse { success: true, delete: id }))
}

async fn fetch_all(pool: &SqlitePool) -> AppResult<Vec<Drink>> {
    let drinks = sqlx::query_as::<_, DbDrink>("SELECT id, title, recipe FROM drinks ORDER BY id")
        .fetch_all(pool)
        .await?;

    if drinks.is_empty() {
        return Err(AppError::not_found("no drinks on the menu"));
    }

    drinks.into_iter().map(Drink::try_from).collect()
}

async fn fetch_drink(pool: &SqlitePool, id: i64) -> AppResult<Drink> {
    sqlx::query_as::<_, DbDrink>("SELECT id, title, recipe FROM drinks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("drink not found"))?
        .try_into()
}

fn encode_recipe(recipe: &[crate::models::drink::RecipePart]) -> AppResult<String> {
    serde_json::to_string(recipe)
        .map_err(|err| AppError::internal(format!("failed to encode recipe: {err}")))
}

fn unique_title(err: sqlx::Error, title: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::conflict(format!("a drink titled '{title}' already exists"))
        }
        _ => AppError::Database(err),
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(err) => AppError::unprocessable(err.body_text()),
        other => AppError::bad_request(other.body_text()),
    }
}
