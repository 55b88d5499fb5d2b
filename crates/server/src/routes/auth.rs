use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use services::LoginRequest;
use tracing::info;
use training_core::model::User;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, AuthUser};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user: User,
    expires_at: DateTime<Utc>,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = state.services.auth().login(request).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        user: session.user,
        expires_at: session.expires_at,
    }))
}

async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode, ApiError> {
    state.services.auth().logout(&auth.token).await?;
    info!(user_id = %auth.user.id, "signed out");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}
