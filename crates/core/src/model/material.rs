use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::MaterialId;
use crate::model::media::{MediaError, MediaUrl, VideoSource};
use crate::model::quiz::{Quiz, QuizError, QuizQuestionDraft};

/// Month label used when an admin leaves the schedule blank ("as needed").
pub const DEFAULT_MONTH: &str = "수시";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MaterialError {
    #[error("material title cannot be empty")]
    EmptyTitle,

    #[error("unknown material type: {0}")]
    UnknownKind(String),

    #[error("slide {index}: {source}")]
    Slide {
        index: usize,
        #[source]
        source: MediaError,
    },

    #[error("audio {index} has no matching slide")]
    AudioWithoutSlide { index: usize },

    #[error("video {index}: {source}")]
    Video {
        index: usize,
        #[source]
        source: MediaError,
    },

    #[error(transparent)]
    Quiz(#[from] QuizError),
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Card,
    Video,
}

impl MaterialKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MaterialKind::Card => "card",
            MaterialKind::Video => "video",
        }
    }

    /// # Errors
    ///
    /// Returns `MaterialError::UnknownKind` for anything but `card`/`video`.
    pub fn parse(raw: &str) -> Result<Self, MaterialError> {
        match raw.trim() {
            "card" => Ok(MaterialKind::Card),
            "video" => Ok(MaterialKind::Video),
            other => Err(MaterialError::UnknownKind(other.to_owned())),
        }
    }

    /// Label printed on exported reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MaterialKind::Card => "카드형",
            MaterialKind::Video => "동영상",
        }
    }
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// One image of a card deck, optionally narrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slide {
    pub image: MediaUrl,
    pub audio: Option<MediaUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialContent {
    Cards(Vec<Slide>),
    Videos(Vec<VideoSource>),
}

impl MaterialContent {
    #[must_use]
    pub fn kind(&self) -> MaterialKind {
        match self {
            MaterialContent::Cards(_) => MaterialKind::Card,
            MaterialContent::Videos(_) => MaterialKind::Video,
        }
    }

    /// Number of slides or videos.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            MaterialContent::Cards(slides) => slides.len(),
            MaterialContent::Videos(videos) => videos.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Flat, unvalidated material as submitted by an admin or read from storage.
///
/// `audio_urls` is index-aligned with `card_images`; a blank entry means
/// the slide has no narration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaterialDraft {
    pub title: String,
    pub description: Option<String>,
    pub month: Option<String>,
    pub kind: Option<MaterialKind>,
    pub card_images: Vec<String>,
    pub audio_urls: Vec<String>,
    pub video_urls: Vec<String>,
    pub quiz: Vec<QuizQuestionDraft>,
}

impl MaterialDraft {
    /// # Errors
    ///
    /// Returns `MaterialError` for a blank title, malformed media references or
    /// an invalid quiz.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedMaterial, MaterialError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(MaterialError::EmptyTitle);
        }
        let description = self
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        let month = self
            .month
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MONTH.to_owned());

        let kind = self.kind.unwrap_or(if self.video_urls.is_empty() {
            MaterialKind::Card
        } else {
            MaterialKind::Video
        });
        let content = match kind {
            MaterialKind::Card => {
                MaterialContent::Cards(build_slides(&self.card_images, &self.audio_urls)?)
            }
            MaterialKind::Video => MaterialContent::Videos(build_videos(&self.video_urls)?),
        };
        let quiz = Quiz::from_drafts(self.quiz)?;

        Ok(ValidatedMaterial {
            title,
            description,
            month,
            content,
            quiz,
            created_at: now,
        })
    }
}

fn build_slides(images: &[String], audio: &[String]) -> Result<Vec<Slide>, MaterialError> {
    if let Some(index) = audio
        .iter()
        .enumerate()
        .skip(images.len())
        .find(|(_, a)| !a.trim().is_empty())
        .map(|(i, _)| i)
    {
        return Err(MaterialError::AudioWithoutSlide { index });
    }

    images
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let image =
                MediaUrl::parse(raw).map_err(|source| MaterialError::Slide { index, source })?;
            let audio = match audio.get(index).map(|a| a.trim()) {
                Some(a) if !a.is_empty() => Some(
                    MediaUrl::parse(a).map_err(|source| MaterialError::Slide { index, source })?,
                ),
                _ => None,
            };
            Ok(Slide { image, audio })
        })
        .collect()
}

fn build_videos(urls: &[String]) -> Result<Vec<VideoSource>, MaterialError> {
    urls.iter()
        .filter(|u| !u.trim().is_empty())
        .enumerate()
        .map(|(index, raw)| {
            VideoSource::parse(raw).map_err(|source| MaterialError::Video { index, source })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMaterial {
    pub title: String,
    pub description: Option<String>,
    pub month: String,
    pub content: MaterialContent,
    pub quiz: Quiz,
    pub created_at: DateTime<Utc>,
}

impl ValidatedMaterial {
    #[must_use]
    pub fn assign_id(self, id: MaterialId) -> Material {
        Material {
            id,
            title: self.title,
            description: self.description,
            month: self.month,
            content: self.content,
            quiz: self.quiz,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }

    /// Rebuilds an existing material, keeping its identity and creation time.
    #[must_use]
    pub fn replace(self, existing: &Material) -> Material {
        Material {
            id: existing.id,
            title: self.title,
            description: self.description,
            month: self.month,
            content: self.content,
            quiz: self.quiz,
            created_at: existing.created_at,
            updated_at: self.created_at,
        }
    }
}

//
// ─── MATERIAL ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub id: MaterialId,
    pub title: String,
    pub description: Option<String>,
    pub month: String,
    pub content: MaterialContent,
    pub quiz: Quiz,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    #[must_use]
    pub fn kind(&self) -> MaterialKind {
        self.content.kind()
    }

    /// Flattens the material back into its editable form.
    #[must_use]
    pub fn to_draft(&self) -> MaterialDraft {
        let (card_images, audio_urls, video_urls) = match &self.content {
            MaterialContent::Cards(slides) => (
                slides.iter().map(|s| s.image.to_string()).collect(),
                slides
                    .iter()
                    .map(|s| s.audio.as_ref().map(ToString::to_string).unwrap_or_default())
                    .collect(),
                Vec::new(),
            ),
            MaterialContent::Videos(videos) => (
                Vec::new(),
                Vec::new(),
                videos.iter().map(|v| v.as_str().to_owned()).collect(),
            ),
        };
        MaterialDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            month: Some(self.month.clone()),
            kind: Some(self.kind()),
            card_images,
            audio_urls,
            video_urls,
            quiz: self.quiz.questions().iter().map(|q| q.to_draft()).collect(),
        }
    }
}
