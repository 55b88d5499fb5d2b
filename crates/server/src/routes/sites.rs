use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use services::{SitePatch, SiteWithGuards};
use training_core::model::{Site, SiteDraft, SiteId};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, AuthUser};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sites", get(list).post(create))
        .route("/api/sites/:id", patch(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<SiteWithGuards>>, ApiError> {
    Ok(Json(state.services.sites().list_with_guards().await?))
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(draft): ApiJson<SiteDraft>,
) -> Result<(StatusCode, Json<Site>), ApiError> {
    let site = state.services.sites().create(draft).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<SiteId>,
    ApiJson(patch): ApiJson<SitePatch>,
) -> Result<Json<Site>, ApiError> {
    Ok(Json(state.services.sites().update(id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<SiteId>,
) -> Result<StatusCode, ApiError> {
    state.services.sites().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
