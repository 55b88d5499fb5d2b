//! HTTP error mapping. Every failure leaves the server as
//! `{"message": "..."}` with a status derived from the service error.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use services::error::{
    AuthError, GuardServiceError, ImportError, MaterialServiceError, NotificationServiceError,
    RecordServiceError, ReportError, SiteServiceError, UploadError,
};
use storage::repository::StorageError;
use tracing::error;
use training_core::model::MaterialError;

const INTERNAL: &str = "서버 오류가 발생했습니다";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// Logs the cause and hides it from the client.
    fn internal(cause: &dyn std::fmt::Display) -> Self {
        error!(error = %cause, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::new(StatusCode::NOT_FOUND, "찾을 수 없습니다"),
            StorageError::Conflict(_) => Self::new(StatusCode::CONFLICT, "이미 존재하는 항목입니다"),
            other => Self::internal(&other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<MaterialError> for ApiError {
    fn from(err: MaterialError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<MaterialServiceError> for ApiError {
    fn from(err: MaterialServiceError) -> Self {
        match err {
            MaterialServiceError::Material(e) => e.into(),
            MaterialServiceError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<SiteServiceError> for ApiError {
    fn from(err: SiteServiceError) -> Self {
        match err {
            SiteServiceError::Site(e) => Self::bad_request(e.to_string()),
            SiteServiceError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<GuardServiceError> for ApiError {
    fn from(err: GuardServiceError) -> Self {
        match err {
            GuardServiceError::DuplicateUsername(_) => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
            GuardServiceError::NotAGuard(_) => StorageError::NotFound.into(),
            GuardServiceError::User(e) => Self::bad_request(e.to_string()),
            GuardServiceError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<RecordServiceError> for ApiError {
    fn from(err: RecordServiceError) -> Self {
        match err {
            RecordServiceError::FailedAttempt | RecordServiceError::ScoreOutOfRange(_) => {
                Self::bad_request(err.to_string())
            }
            RecordServiceError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<NotificationServiceError> for ApiError {
    fn from(err: NotificationServiceError) -> Self {
        match err {
            NotificationServiceError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownUser
            | AuthError::InvalidPassword
            | AuthError::AdminOnGuardLogin
            | AuthError::Unauthenticated => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            AuthError::Forbidden => Self::forbidden(err.to_string()),
            AuthError::User(e) => Self::bad_request(e.to_string()),
            AuthError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Workbook(_) | ImportError::NoCompanySheet => {
                Self::bad_request(err.to_string())
            }
            ImportError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Records(e) => e.into(),
            ReportError::Storage(e) => e.into(),
            other => Self::internal(&other),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Empty | UploadError::InvalidKey(_) => Self::bad_request(err.to_string()),
            UploadError::TooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            UploadError::UnknownToken => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            UploadError::TokenExpired => Self::new(StatusCode::GONE, err.to_string()),
            other => Self::internal(&other),
        }
    }
}
