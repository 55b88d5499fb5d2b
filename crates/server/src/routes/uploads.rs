use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use services::{StoredObject, UploadRequest, UploadTicket};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson};
use crate::routes::file_part;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/uploads", post(upload))
        .route("/api/uploads/request-url", post(request_url))
        .route("/api/uploads/signed/:token", put(redeem))
}

async fn upload(
    State(state): State<AppState>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredObject>), ApiError> {
    let file = file_part(multipart).await?;
    let stored = state
        .services
        .uploads()
        .upload(&file.name, &file.content_type, file.bytes)
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn request_url(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(request): ApiJson<UploadRequest>,
) -> Result<Json<UploadTicket>, ApiError> {
    Ok(Json(state.services.uploads().request_url(request).await?))
}

/// The token in the path is the credential; no bearer header is needed.
async fn redeem(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<Json<StoredObject>, ApiError> {
    Ok(Json(state.services.uploads().redeem(&token, body.to_vec()).await?))
}
