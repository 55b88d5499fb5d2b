use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use services::{GuardPatch, GuardWithSite, ImportSummary, NewGuard};
use training_core::model::{User, UserId};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson};
use crate::routes::file_part;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/guards", get(list).post(create))
        .route("/api/guards/import", post(import))
        .route("/api/guards/:id", patch(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<GuardWithSite>>, ApiError> {
    Ok(Json(state.services.guards().list_with_sites().await?))
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(form): ApiJson<NewGuard>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let guard = state.services.guards().create(form).await?;
    Ok((StatusCode::CREATED, Json(guard)))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<UserId>,
    ApiJson(patch): ApiJson<GuardPatch>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.services.guards().update(id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    state.services.guards().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn import(
    State(state): State<AppState>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Result<Json<ImportSummary>, ApiError> {
    let file = file_part(multipart).await?;
    Ok(Json(state.services.roster().import_xlsx(&file.bytes).await?))
}
