use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ids::{MaterialId, RecordId, UserId};
use crate::model::material::{Material, MaterialKind};
use crate::model::quiz::QuizScore;

/// Durable proof that a guard finished a material.
///
/// Kind and title are copied from the material at write time so the record
/// stays readable after the material is edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub id: RecordId,
    pub guard_id: UserId,
    pub material_id: MaterialId,
    #[serde(rename = "materialType")]
    pub material_kind: MaterialKind,
    pub material_title: String,
    pub completed_at: DateTime<Utc>,
    pub score: Option<u8>,
    pub passed: Option<bool>,
}

/// Create request issued by a playback session or the records endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompletion {
    pub guard_id: UserId,
    pub material_id: MaterialId,
    pub material_kind: MaterialKind,
    pub material_title: String,
    pub score: Option<u8>,
    pub passed: Option<bool>,
}

impl NewCompletion {
    #[must_use]
    pub fn for_material(material: &Material, guard_id: UserId, score: &QuizScore) -> Self {
        Self {
            guard_id,
            material_id: material.id,
            material_kind: material.kind(),
            material_title: material.title.clone(),
            score: Some(score.score()),
            passed: Some(score.passed()),
        }
    }

    #[must_use]
    pub fn into_record(self, id: RecordId, completed_at: DateTime<Utc>) -> CompletionRecord {
        CompletionRecord {
            id,
            guard_id: self.guard_id,
            material_id: self.material_id,
            material_kind: self.material_kind,
            material_title: self.material_title,
            completed_at,
            score: self.score,
            passed: self.passed,
        }
    }
}
