//! Media uploads for card images, narration and video files.
//!
//! Two flows: a direct upload that stores the bytes immediately, and a
//! ticketed flow where the client first asks for a one-time upload URL and
//! then `PUT`s the bytes to it.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Clock;
use crate::error::UploadError;
use crate::password;

/// Where uploaded objects end up.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any previous object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), UploadError>;

    /// URL clients use to fetch the object.
    fn public_path(&self, key: &str) -> String;
}

fn check_key(key: &str) -> Result<(), UploadError> {
    let path = Path::new(key);
    let clean = !key.is_empty()
        && !key.contains('\\')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if clean {
        Ok(())
    } else {
        Err(UploadError::InvalidKey(key.to_owned()))
    }
}

/// Objects written to a local directory and served by the HTTP layer.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), UploadError> {
        check_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "object written");
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }
}

/// Objects sent to an S3-style bucket endpoint with `PUT`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    public_base: String,
}

impl HttpObjectStore {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, public_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            api_key,
            public_base: public_base.into().trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), UploadError> {
        check_key(key)?;
        let mut request = self
            .client
            .put(format!("{}/{key}", self.endpoint))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(UploadError::HttpStatus(response.status()));
        }
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base)
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub ticket_ttl: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            ticket_ttl: Duration::minutes(15),
        }
    }
}

/// Body of `POST /api/uploads/request-url`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub name: String,
    pub size: usize,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTicket {
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    #[serde(rename = "objectPath")]
    pub object_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub object_path: String,
}

#[derive(Debug, Clone)]
struct PendingUpload {
    key: String,
    content_type: String,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct UploadService {
    clock: Clock,
    config: UploadConfig,
    store: Arc<dyn ObjectStore>,
    pending: Arc<Mutex<HashMap<String, PendingUpload>>>,
}

/// Random object key that keeps a short alphanumeric extension from `name`.
fn object_key(name: &str) -> String {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);
    match ext {
        Some(ext) => format!("uploads/{}.{ext}", Uuid::new_v4()),
        None => format!("uploads/{}", Uuid::new_v4()),
    }
}

impl UploadService {
    #[must_use]
    pub fn new(clock: Clock, config: UploadConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            clock,
            config,
            store,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check_size(&self, size: usize) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.config.max_bytes {
            return Err(UploadError::TooLarge {
                limit: self.config.max_bytes,
            });
        }
        Ok(())
    }

    /// Stores the bytes right away and returns their public path.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Empty`/`TooLarge` for bad sizes or the store's
    /// error if the write fails.
    pub async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, UploadError> {
        self.check_size(bytes.len())?;
        let key = object_key(name);
        let size = bytes.len();
        self.store.put(&key, bytes, content_type).await?;
        info!(%key, size, "upload stored");
        Ok(StoredObject {
            object_path: self.store.public_path(&key),
        })
    }

    /// Issues a one-time upload URL. The object path is final and can be
    /// saved before the bytes arrive.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Empty`/`TooLarge` when the announced size is
    /// out of bounds.
    pub async fn request_url(&self, request: UploadRequest) -> Result<UploadTicket, UploadError> {
        self.check_size(request.size)?;
        let token = password::new_token();
        let key = object_key(&request.name);
        let object_path = self.store.public_path(&key);
        let now = self.clock.now();

        let mut pending = self.pending.lock().await;
        pending.retain(|_, p| p.expires_at > now);
        pending.insert(
            token.clone(),
            PendingUpload {
                key,
                content_type: request.content_type,
                expires_at: now + self.config.ticket_ttl,
            },
        );
        Ok(UploadTicket {
            upload_url: format!("/api/uploads/signed/{token}"),
            object_path,
        })
    }

    /// Consumes an upload token and stores the bytes.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnknownToken` for unknown or spent tokens,
    /// `UploadError::TokenExpired` past the ticket's lifetime, and size or
    /// store errors as for [`UploadService::upload`].
    pub async fn redeem(&self, token: &str, bytes: Vec<u8>) -> Result<StoredObject, UploadError> {
        let ticket = self
            .pending
            .lock()
            .await
            .remove(token)
            .ok_or(UploadError::UnknownToken)?;
        if ticket.expires_at <= self.clock.now() {
            return Err(UploadError::TokenExpired);
        }
        self.check_size(bytes.len())?;
        let size = bytes.len();
        self.store.put(&ticket.key, bytes, &ticket.content_type).await?;
        info!(key = %ticket.key, size, "ticketed upload stored");
        Ok(StoredObject {
            object_path: self.store.public_path(&ticket.key),
        })
    }
}
