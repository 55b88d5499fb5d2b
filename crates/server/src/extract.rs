//! Request extractors: bearer-token identity and JSON bodies that fail with
//! [`ApiError`].

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use services::error::AuthError;
use training_core::model::{User, UserId};

use crate::AppState;
use crate::error::ApiError;

/// JSON body whose rejection renders as `{"message"}`.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Any signed-in user. Rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    /// The user's id when they are a guard. Admins get 403.
    ///
    /// # Errors
    ///
    /// Returns 403 for admin accounts.
    pub fn guard_id(&self) -> Result<UserId, ApiError> {
        if self.user.is_admin() {
            return Err(ApiError::forbidden("경비원 계정으로 로그인해주세요"));
        }
        Ok(self.user.id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::Unauthenticated)?.to_owned();
        let user = state.services.auth().current_user(&token).await?;
        Ok(Self { user, token })
    }
}

/// A signed-in admin. Rejects with 401, or 403 for guards.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::Unauthenticated)?;
        let user = state.services.auth().require_admin(token).await?;
        Ok(Self(user))
    }
}
