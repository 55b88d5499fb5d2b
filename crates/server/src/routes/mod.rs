pub(crate) mod auth;
pub(crate) mod guards;
pub(crate) mod health;
pub(crate) mod materials;
pub(crate) mod notifications;
pub(crate) mod records;
pub(crate) mod sites;
pub(crate) mod uploads;

use axum::extract::Multipart;

use crate::error::ApiError;

/// A file pulled out of a multipart body.
pub(crate) struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Takes the first part named `file`.
pub(crate) async fn file_part(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_owned();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field.bytes().await?.to_vec();
        return Ok(UploadedFile {
            name,
            content_type,
            bytes,
        });
    }
    Err(ApiError::bad_request("file 필드가 필요합니다"))
}
