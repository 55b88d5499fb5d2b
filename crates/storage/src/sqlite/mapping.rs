use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use training_core::model::{
    Company, CompletionRecord, Material, MaterialKind, Notification, Role, Site, User,
};

use crate::normalize::{FlexibleList, MaterialDocument};
use crate::repository::{Credential, SessionRecord, StorageError};

pub(crate) fn ser<E: Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, surfacing constraint violations as domain-level outcomes.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict(db.message().to_owned());
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T, StorageError>
where
    T: FromStr,
    T::Err: Display,
{
    row.try_get::<String, _>(column)
        .map_err(ser)?
        .parse()
        .map_err(ser)
}

fn parsed_opt<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, StorageError>
where
    T: FromStr,
    T::Err: Display,
{
    row.try_get::<Option<String>, _>(column)
        .map_err(ser)?
        .map(|raw| raw.parse().map_err(ser))
        .transpose()
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    let company = row
        .try_get::<Option<String>, _>("company")
        .map_err(ser)?
        .map(|c| Company::parse(&c).map_err(ser))
        .transpose()?;
    Ok(User {
        id: parsed(row, "id")?,
        username: row.try_get("username").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        phone: row.try_get("phone").map_err(ser)?,
        role: Role::parse(&role).map_err(ser)?,
        company,
        site_id: parsed_opt(row, "site_id")?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_credential_row(row: &SqliteRow) -> Result<Option<Credential>, StorageError> {
    let salt: Option<String> = row.try_get("password_salt").map_err(ser)?;
    let digest: Option<String> = row.try_get("password_digest").map_err(ser)?;
    Ok(salt.zip(digest).map(|(salt, digest)| Credential { salt, digest }))
}

pub(crate) fn map_site_row(row: &SqliteRow) -> Result<Site, StorageError> {
    let company: String = row.try_get("company").map_err(ser)?;
    Ok(Site {
        id: parsed(row, "id")?,
        name: row.try_get("name").map_err(ser)?,
        company: Company::parse(&company).map_err(ser)?,
        address: row.try_get("address").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

/// List columns of a material, encoded as canonical JSON arrays.
pub(crate) struct MaterialColumns {
    pub card_images: String,
    pub audio_urls: String,
    pub video_urls: String,
    pub quizzes: String,
}

impl MaterialColumns {
    pub(crate) fn from_material(material: &Material) -> Result<Self, StorageError> {
        let doc = MaterialDocument::from_material(material);
        let encode = |list: Option<FlexibleList<String>>| list.unwrap_or_default().to_column();
        Ok(Self {
            card_images: encode(doc.card_images).map_err(ser)?,
            audio_urls: encode(doc.audio_urls).map_err(ser)?,
            video_urls: encode(doc.video_urls).map_err(ser)?,
            quizzes: doc.quizzes.unwrap_or_default().to_column().map_err(ser)?,
        })
    }
}

pub(crate) fn map_material_row(row: &SqliteRow) -> Result<Material, StorageError> {
    let list = |column: &str| -> Result<Option<FlexibleList<String>>, StorageError> {
        let raw: Option<String> = row.try_get(column).map_err(ser)?;
        FlexibleList::parse_column(raw.as_deref()).map(Some).map_err(ser)
    };
    let quizzes: Option<String> = row.try_get("quizzes").map_err(ser)?;
    let doc = MaterialDocument {
        id: None,
        title: Some(row.try_get("title").map_err(ser)?),
        description: row.try_get("description").map_err(ser)?,
        kind: Some(row.try_get("kind").map_err(ser)?),
        month: Some(row.try_get("month").map_err(ser)?),
        video_url: None,
        video_urls: list("video_urls")?,
        card_images: list("card_images")?,
        audio_urls: list("audio_urls")?,
        quizzes: Some(FlexibleList::parse_column(quizzes.as_deref()).map_err(ser)?),
    };

    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
    let mut material = doc
        .into_draft()
        .map_err(ser)?
        .validate(created_at)
        .map_err(ser)?
        .assign_id(parsed(row, "id")?);
    material.updated_at = row.try_get("updated_at").map_err(ser)?;
    Ok(material)
}

pub(crate) fn map_record_row(row: &SqliteRow) -> Result<CompletionRecord, StorageError> {
    let kind: String = row.try_get("material_kind").map_err(ser)?;
    let score = row
        .try_get::<Option<i64>, _>("score")
        .map_err(ser)?
        .map(|s| u8::try_from(s).map_err(|_| StorageError::Serialization(format!("invalid score: {s}"))))
        .transpose()?;
    Ok(CompletionRecord {
        id: parsed(row, "id")?,
        guard_id: parsed(row, "guard_id")?,
        material_id: parsed(row, "material_id")?,
        material_kind: MaterialKind::parse(&kind).map_err(ser)?,
        material_title: row.try_get("material_title").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        score,
        passed: row
            .try_get::<Option<i64>, _>("passed")
            .map_err(ser)?
            .map(|p| p != 0),
    })
}

pub(crate) fn map_notification_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    Ok(Notification {
        id: parsed(row, "id")?,
        guard_id: parsed(row, "guard_id")?,
        material_id: parsed(row, "material_id")?,
        is_read: row.try_get::<i64, _>("is_read").map_err(ser)? != 0,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
    Ok(SessionRecord {
        token: row.try_get("token").map_err(ser)?,
        user_id: parsed(row, "user_id")?,
        created_at: row.try_get("created_at").map_err(ser)?,
        expires_at: row.try_get("expires_at").map_err(ser)?,
    })
}
