//! Boundary normalization for list-valued material fields.
//!
//! Older rows and some clients store `cardImages`, `audioUrls`, `videoUrls`
//! and `quizzes` as a JSON array, a JSON-encoded string of an array, or
//! null. Everything is turned into a plain `Vec` here so the domain never
//! sees the ambiguity.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use training_core::model::{Material, MaterialDraft, MaterialError, MaterialKind, QuizQuestionDraft};

// A string may wrap an encoded array, which may itself be a string.
const MAX_ENCODING_DEPTH: usize = 3;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NormalizeError {
    #[error("expected a list or an encoded list, found {0}")]
    NotAList(&'static str),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A list that tolerates the legacy encodings described above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexibleList<T>(pub Vec<T>);

impl<T> Default for FlexibleList<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> FlexibleList<T> {
    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T: DeserializeOwned> FlexibleList<T> {
    /// # Errors
    ///
    /// Returns `NormalizeError` if the value is neither null, an array nor a
    /// string holding one.
    pub fn from_value(value: Value) -> Result<Self, NormalizeError> {
        let mut current = value;
        for _ in 0..MAX_ENCODING_DEPTH {
            match current {
                Value::Null => return Ok(Self::default()),
                Value::Array(_) => return Ok(Self(serde_json::from_value(current)?)),
                Value::String(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        return Ok(Self::default());
                    }
                    current = serde_json::from_str(trimmed)?;
                }
                Value::Bool(_) => return Err(NormalizeError::NotAList("a boolean")),
                Value::Number(_) => return Err(NormalizeError::NotAList("a number")),
                Value::Object(_) => return Err(NormalizeError::NotAList("an object")),
            }
        }
        Err(NormalizeError::NotAList("a nested string"))
    }

    /// Parses a stored TEXT column. `None` and blank text yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError` for text that is not JSON or not a list.
    pub fn parse_column(raw: Option<&str>) -> Result<Self, NormalizeError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(text) => Self::from_value(serde_json::from_str(text)?),
        }
    }
}

impl<T: Serialize> FlexibleList<T> {
    /// Canonical column encoding: a plain JSON array.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError::Json` if an element cannot be serialized.
    pub fn to_column(&self) -> Result<String, NormalizeError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for FlexibleList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl<T: Serialize> Serialize for FlexibleList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

//
// ─── MATERIAL DOCUMENT ─────────────────────────────────────────────────────────
//

/// Flat material shape used on the wire and in storage rows.
///
/// Every field is optional so the same type serves full creates and partial
/// updates; see [`MaterialDocument::apply_to`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    /// Legacy single-video field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub video_urls: Option<FlexibleList<String>>,
    #[serde(default)]
    pub card_images: Option<FlexibleList<String>>,
    #[serde(default)]
    pub audio_urls: Option<FlexibleList<String>>,
    #[serde(default)]
    pub quizzes: Option<FlexibleList<QuizQuestionDraft>>,
}

impl MaterialDocument {
    #[must_use]
    pub fn from_material(material: &Material) -> Self {
        let draft = material.to_draft();
        Self {
            id: Some(material.id.to_string()),
            title: Some(draft.title),
            description: draft.description,
            kind: Some(material.kind().as_str().to_owned()),
            month: Some(draft.month.unwrap_or_default()),
            video_url: None,
            video_urls: Some(FlexibleList(draft.video_urls)),
            card_images: Some(FlexibleList(draft.card_images)),
            audio_urls: Some(FlexibleList(draft.audio_urls)),
            quizzes: Some(FlexibleList(draft.quiz)),
        }
    }

    /// Builds a draft for a brand new material.
    ///
    /// # Errors
    ///
    /// Returns `MaterialError::UnknownKind` for an unrecognized `type`.
    pub fn into_draft(self) -> Result<MaterialDraft, MaterialError> {
        self.apply_to(MaterialDraft::default())
    }

    /// Overlays the fields that are present onto `base`.
    ///
    /// # Errors
    ///
    /// Returns `MaterialError::UnknownKind` for an unrecognized `type`.
    pub fn apply_to(self, mut base: MaterialDraft) -> Result<MaterialDraft, MaterialError> {
        if let Some(title) = self.title {
            base.title = title;
        }
        if let Some(description) = self.description {
            base.description = Some(description);
        }
        if let Some(kind) = self.kind {
            base.kind = Some(MaterialKind::parse(&kind)?);
        }
        if let Some(month) = self.month {
            base.month = Some(month);
        }
        let legacy = self.video_url.filter(|u| !u.trim().is_empty());
        match (self.video_urls.map(FlexibleList::into_inner), legacy) {
            (Some(list), _) if !list.is_empty() => base.video_urls = list,
            (_, Some(single)) => base.video_urls = vec![single],
            (Some(empty), None) => base.video_urls = empty,
            (None, None) => {}
        }
        if let Some(images) = self.card_images {
            base.card_images = images.into_inner();
        }
        if let Some(audio) = self.audio_urls {
            base.audio_urls = audio.into_inner();
        }
        if let Some(quizzes) = self.quizzes {
            base.quiz = quizzes.into_inner();
        }
        Ok(base)
    }
}
