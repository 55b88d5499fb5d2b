use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::normalize::MaterialDocument;
use training_core::model::{Material, MaterialId};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, AuthUser};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/training-materials", get(list).post(create))
        .route(
            "/api/training-materials/:id",
            get(show).patch(update).delete(remove),
        )
}

/// Material as sent to clients: the flat document plus timestamps.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MaterialView {
    #[serde(flatten)]
    document: MaterialDocument,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Material> for MaterialView {
    fn from(material: &Material) -> Self {
        Self {
            document: MaterialDocument::from_material(material),
            created_at: material.created_at,
            updated_at: material.updated_at,
        }
    }
}

async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<MaterialView>>, ApiError> {
    let materials = state.services.materials().list().await?;
    Ok(Json(materials.iter().map(MaterialView::from).collect()))
}

async fn show(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<MaterialId>,
) -> Result<Json<MaterialView>, ApiError> {
    let material = state.services.materials().get(id).await?;
    Ok(Json(MaterialView::from(&material)))
}

async fn create(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(document): ApiJson<MaterialDocument>,
) -> Result<(StatusCode, Json<MaterialView>), ApiError> {
    let material = state
        .services
        .materials()
        .create(document.into_draft()?)
        .await?;
    Ok((StatusCode::CREATED, Json(MaterialView::from(&material))))
}

async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<MaterialId>,
    ApiJson(document): ApiJson<MaterialDocument>,
) -> Result<Json<MaterialView>, ApiError> {
    let material = state.services.materials().update(id, document).await?;
    Ok(Json(MaterialView::from(&material)))
}

async fn remove(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<MaterialId>,
) -> Result<StatusCode, ApiError> {
    state.services.materials().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
