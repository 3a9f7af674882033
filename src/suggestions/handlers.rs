use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::dto::{validate_eating_types, MealRequest, SessionResponse, StartSessionRequest};
use super::service::SessionView;
use crate::{auth::AuthUser, error::AppResult, foods::model::UserPreferences, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/suggestions/sessions", post(start_session))
        .route(
            "/suggestions/sessions/:id",
            get(get_session).delete(dispose_session),
        )
        .route("/suggestions/sessions/:id/more", post(load_more))
        .route("/suggestions/sessions/:id/meal", put(change_meal))
        .route("/suggestions/sessions/:id/filters", put(change_filters))
        .route("/suggestions/sessions/:id/retry", post(retry))
        .route(
            "/suggestions/sessions/:id/foods/:food_id/consume",
            post(confirm_consumption),
        )
}

impl From<SessionView> for SessionResponse {
    fn from(view: SessionView) -> Self {
        Self {
            result: view.result,
            notices: view.notices,
        }
    }
}

#[instrument(skip(state))]
pub async fn start_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<StartSessionRequest>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;
    let now = OffsetDateTime::now_utc();
    let view = state
        .suggestions
        .start(
            &user,
            req.today.unwrap_or_else(|| now.date()),
            req.hour.unwrap_or_else(|| now.hour()),
            req.eating_types,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let result = state.suggestions.result(&user, id).await?;
    Ok(Json(SessionResponse {
        result,
        notices: Vec::new(),
    }))
}

#[instrument(skip(state))]
pub async fn load_more(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    Ok(Json(state.suggestions.load_more(&user, id).await?.into()))
}

#[instrument(skip(state))]
pub async fn change_meal(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MealRequest>,
) -> AppResult<Json<SessionResponse>> {
    validate_eating_types(req.eating_types.as_ref())?;
    let view = state
        .suggestions
        .change_meal(&user, id, req.eating_types)
        .await?;
    Ok(Json(view.into()))
}

/// Replaces the session's preference filters without saving them.
#[instrument(skip(state))]
pub async fn change_filters(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(preferences): Json<UserPreferences>,
) -> AppResult<Json<SessionResponse>> {
    let view = state
        .suggestions
        .change_filters(&user, id, preferences)
        .await?;
    Ok(Json(view.into()))
}

#[instrument(skip(state))]
pub async fn retry(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    Ok(Json(state.suggestions.retry(&user, id).await?.into()))
}

#[instrument(skip(state))]
pub async fn confirm_consumption(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((id, food_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<SessionResponse>> {
    let view = state
        .suggestions
        .confirm_consumption(&user, id, food_id)
        .await?;
    Ok(Json(view.into()))
}

#[instrument(skip(state))]
pub async fn dispose_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.suggestions.dispose(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
