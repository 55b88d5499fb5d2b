//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use training_core::model::{MaterialError, SiteError, UserError};
use training_core::playback::PlaybackError;

/// Errors emitted by `MaterialService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MaterialServiceError {
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SiteService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SiteServiceError {
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `GuardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuardServiceError {
    #[error("이미 등록된 이름입니다: {0}")]
    DuplicateUsername(String),
    #[error("user {0} is not a guard")]
    NotAGuard(String),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RecordService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordServiceError {
    #[error("failed attempts are not recorded")]
    FailedAttempt,
    #[error("score {0} is out of range")]
    ScoreOutOfRange(u8),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `NotificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotificationServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("등록되지 않은 사용자입니다")]
    UnknownUser,
    #[error("비밀번호가 올바르지 않습니다")]
    InvalidPassword,
    #[error("관리자는 관리자 아이디로 로그인해주세요")]
    AdminOnGuardLogin,
    #[error("로그인이 필요합니다")]
    Unauthenticated,
    #[error("관리자 권한이 필요합니다")]
    Forbidden,
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PlaybackService` and `PlaybackDriver`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaybackServiceError {
    #[error("no signed-in guard")]
    NoIdentity,
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the roster import.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("workbook could not be read: {0}")]
    Workbook(String),
    #[error("no worksheet names a known company")]
    NoCompanySheet,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while building record reports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("pdf rendering failed: {0}")]
    Pdf(String),
    #[error("report font could not be loaded: {0}")]
    Font(String),
    #[error(transparent)]
    Records(#[from] RecordServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `UploadService` and object stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UploadError {
    #[error("upload is empty")]
    Empty,
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("upload token is unknown or already used")]
    UnknownToken,
    #[error("upload token has expired")]
    TokenExpired,
    #[error("object store returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}
