use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("media URL cannot be empty")]
    EmptyMediaUrl,

    #[error("media URL is not a valid http(s) URL or object path: {0}")]
    InvalidMediaUrl(String),
}

//
// ─── MEDIA URL ─────────────────────────────────────────────────────────────────
//

/// Reference to an uploaded image, audio clip or video file.
///
/// Either an absolute `http(s)` URL or a root-relative object path such as
/// `/objects/uploads/abc.png` served by the local object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUrl(String);

impl MediaUrl {
    /// # Errors
    ///
    /// Returns `MediaError::EmptyMediaUrl` for blank input and
    /// `MediaError::InvalidMediaUrl` for anything that is neither an object
    /// path nor an http(s) URL.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, MediaError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(MediaError::EmptyMediaUrl);
        }
        if s.starts_with('/') && !s.starts_with("//") {
            return Ok(Self(s.to_owned()));
        }
        let url = Url::parse(s).map_err(|_| MediaError::InvalidMediaUrl(s.to_owned()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(s.to_owned())),
            _ => Err(MediaError::InvalidMediaUrl(s.to_owned())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MediaUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

//
// ─── VIDEO SOURCE ──────────────────────────────────────────────────────────────
//

// Group 1 is a bare ID, group 2 an ID pulled out of a watch/embed/short link.
static EMBED_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:([A-Za-z0-9_-]{11})|.*(?:youtu\.be/|/v/|/embed/|watch\?v=|&v=)([A-Za-z0-9_-]{11})(?:[#&?/].*)?)$",
    )
    .expect("embed id pattern should compile")
});

/// One entry of a video material's playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Hosted on the embedded player; progress must be polled.
    Embedded { video_id: String, original: String },
    /// A plain media file played by a native element.
    Direct(MediaUrl),
}

impl VideoSource {
    /// Classifies a stored video reference.
    ///
    /// # Errors
    ///
    /// Returns `MediaError` when the input is blank or, for non-embedded
    /// sources, not a usable media URL.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, MediaError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(MediaError::EmptyMediaUrl);
        }
        if let Some(video_id) = extract_embed_id(s) {
            return Ok(Self::Embedded {
                video_id,
                original: s.to_owned(),
            });
        }
        MediaUrl::parse(s).map(Self::Direct)
    }

    #[must_use]
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Embedded { original, .. } => original,
            Self::Direct(url) => url.as_str(),
        }
    }
}

impl Serialize for VideoSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Pulls the 11-character embedded-player ID out of a URL, if it has one.
#[must_use]
pub fn extract_embed_id(raw: &str) -> Option<String> {
    let caps = EMBED_ID.captures(raw.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_owned())
}
