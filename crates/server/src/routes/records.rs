use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use services::{CompletionRequest, RecordScope, RecordWithGuard, SiteStat};
use training_core::model::{CompletionRecord, SiteId, UserId};

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{AdminUser, ApiJson, AuthUser};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/training-records", get(list).post(submit))
        .route("/api/training-records/my", get(mine))
        .route("/api/training-records/export", get(export))
        .route("/api/stats", get(stats))
}

async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<RecordWithGuard>>, ApiError> {
    Ok(Json(state.services.records().list(RecordScope::All).await?))
}

async fn mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<CompletionRecord>>, ApiError> {
    Ok(Json(state.services.records().list_mine(auth.user.id).await?))
}

async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(request): ApiJson<CompletionRequest>,
) -> Result<(StatusCode, Json<CompletionRecord>), ApiError> {
    let guard_id = auth.guard_id()?;
    let record = state.services.records().submit(guard_id, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    guard_id: Option<UserId>,
    site_id: Option<SiteId>,
}

impl ExportQuery {
    fn scope(&self) -> Result<RecordScope, ApiError> {
        match (self.guard_id, self.site_id) {
            (None, None) => Ok(RecordScope::All),
            (Some(guard), None) => Ok(RecordScope::Guard(guard)),
            (None, Some(site)) => Ok(RecordScope::Site(site)),
            (Some(_), Some(_)) => Err(ApiError::bad_request(
                "guardId와 siteId는 함께 지정할 수 없습니다",
            )),
        }
    }
}

async fn export(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pdf = state.services.reports().render(query.scope()?).await?;
    Ok((
        [
            (CONTENT_TYPE, "application/pdf"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"training-records.pdf\"",
            ),
        ],
        pdf,
    ))
}

async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<SiteStat>>, ApiError> {
    Ok(Json(state.services.records().site_stats().await?))
}
