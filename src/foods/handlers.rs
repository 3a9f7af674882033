use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CatalogPageResponse, CatalogParams, CreateFoodRequest, ImportFoodRequest, PatchFoodRequest,
};
use super::model::{NewPersonalFood, PersonalFoodItem, UserPreferences};
use super::store::DuplicateName;
use crate::{
    auth::AuthUser,
    config::MAX_PAGE_SIZE,
    error::{AppError, AppResult},
    state::AppState,
    suggestions::paginator::{fetch_page, CatalogFilter},
};

pub fn preference_routes() -> Router<AppState> {
    Router::new().route("/preferences", get(get_preferences).put(put_preferences))
}

pub fn food_routes() -> Router<AppState> {
    Router::new()
        .route("/foods", get(list_foods).post(add_food))
        .route("/foods/import", post(import_food))
        .route("/foods/:id", get(get_food).patch(patch_food))
        .route("/catalog", get(query_catalog))
}

fn unavailable(e: anyhow::Error) -> AppError {
    warn!(error = %e, "food store call failed");
    AppError::TransientFetch(e.to_string())
}

fn write_failed(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<DuplicateName>() {
        Some(dup) => AppError::Conflict(dup.to_string()),
        None => unavailable(e),
    }
}

#[instrument(skip(state))]
pub async fn get_preferences(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<UserPreferences>> {
    let prefs = state.store.preferences(&user).await.map_err(unavailable)?;
    Ok(Json(prefs.unwrap_or_default()))
}

#[instrument(skip(state))]
pub async fn put_preferences(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(prefs): Json<UserPreferences>,
) -> AppResult<Json<UserPreferences>> {
    state
        .store
        .save_preferences(&user, &prefs)
        .await
        .map_err(unavailable)?;
    info!(%user, "preferences saved");
    Ok(Json(prefs))
}

#[instrument(skip(state))]
pub async fn list_foods(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<PersonalFoodItem>>> {
    let items = state.store.list_personal(&user).await.map_err(unavailable)?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_food(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PersonalFoodItem>> {
    state
        .store
        .get_personal(&user, id)
        .await
        .map_err(unavailable)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("food {id}")))
}

#[instrument(skip(state))]
pub async fn add_food(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateFoodRequest>,
) -> AppResult<(StatusCode, Json<PersonalFoodItem>)> {
    let food = req.into_new()?;
    let item = state
        .store
        .add_personal(&user, food)
        .await
        .map_err(write_failed)?;
    info!(%user, id = %item.id, name = %item.name, "personal food added");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn patch_food(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchFoodRequest>,
) -> AppResult<Json<PersonalFoodItem>> {
    let patch = req.into_patch()?;
    state
        .store
        .update_personal(&user, id, &patch)
        .await
        .map_err(write_failed)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("food {id}")))
}

/// Copies a catalog dish into the user's own list, once per name.
#[instrument(skip(state))]
pub async fn import_food(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ImportFoodRequest>,
) -> AppResult<(StatusCode, Json<PersonalFoodItem>)> {
    let source = state
        .store
        .get_catalog(req.catalog_id)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| AppError::NotFound(format!("catalog item {}", req.catalog_id)))?;

    // The store rejects a taken name atomically.
    let item = state
        .store
        .add_personal(&user, NewPersonalFood::from(&source))
        .await
        .map_err(write_failed)?;
    info!(%user, id = %item.id, catalog_id = %source.id, "catalog food imported");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn query_catalog(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<CatalogParams>,
) -> AppResult<Json<CatalogPageResponse>> {
    let cfg = &state.config.suggestions;
    let limit = params.limit.unwrap_or(cfg.page_size.min(MAX_PAGE_SIZE));
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(AppError::InvalidInput(format!(
            "limit must be within 1..={MAX_PAGE_SIZE}"
        )));
    }

    let prefs = UserPreferences {
        food_types: params.food_types()?,
        cuisines: params.cuisines(),
    };
    let (filter, truncated) = CatalogFilter::from_preferences(&prefs, cfg.max_filter_values);
    let cursor = params.cursor()?;

    let page = fetch_page(state.store.as_ref(), &filter, cursor.as_ref(), limit).await?;
    Ok(Json(CatalogPageResponse::new(page, truncated)))
}
