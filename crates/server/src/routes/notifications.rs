use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use services::NotificationWithMaterial;
use training_core::model::NotificationId;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::AuthUser;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/read-all", post(read_all))
        .route("/api/notifications/:id/read", post(read))
        .route("/api/notifications/:id", delete(remove))
}

async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<NotificationWithMaterial>>, ApiError> {
    Ok(Json(state.services.notifications().list_mine(auth.user.id).await?))
}

async fn read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ApiError> {
    state.services.notifications().mark_read(auth.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn read_all(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let updated = state.services.notifications().mark_all_read(auth.user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ApiError> {
    state.services.notifications().delete_if_owner(auth.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
