use training_core::model::{Material, MaterialId};

use super::SqliteRepository;
use super::mapping::{MaterialColumns, db_err, map_material_row};
use crate::repository::{MaterialRepository, StorageError};

const MATERIAL_COLUMNS: &str = "id, title, description, kind, month, card_images, audio_urls, \
                                video_urls, quizzes, created_at, updated_at";

#[async_trait::async_trait]
impl MaterialRepository for SqliteRepository {
    async fn insert_material(&self, material: &Material) -> Result<(), StorageError> {
        let cols = MaterialColumns::from_material(material)?;
        sqlx::query(
            r"
            INSERT INTO training_materials (
                id, title, description, kind, month, card_images, audio_urls,
                video_urls, quizzes, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(material.id.to_string())
        .bind(&material.title)
        .bind(&material.description)
        .bind(material.kind().as_str())
        .bind(&material.month)
        .bind(cols.card_images)
        .bind(cols.audio_urls)
        .bind(cols.video_urls)
        .bind(cols.quizzes)
        .bind(material.created_at)
        .bind(material.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_material(&self, material: &Material) -> Result<(), StorageError> {
        let cols = MaterialColumns::from_material(material)?;
        let res = sqlx::query(
            r"
            UPDATE training_materials
            SET title = ?2, description = ?3, kind = ?4, month = ?5, card_images = ?6,
                audio_urls = ?7, video_urls = ?8, quizzes = ?9, updated_at = ?10
            WHERE id = ?1
            ",
        )
        .bind(material.id.to_string())
        .bind(&material.title)
        .bind(&material.description)
        .bind(material.kind().as_str())
        .bind(&material.month)
        .bind(cols.card_images)
        .bind(cols.audio_urls)
        .bind(cols.video_urls)
        .bind(cols.quizzes)
        .bind(material.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_material(&self, id: MaterialId) -> Result<Option<Material>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM training_materials WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_material_row).transpose()
    }

    async fn list_materials(&self) -> Result<Vec<Material>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM training_materials ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_material_row).collect()
    }

    async fn delete_material(&self, id: MaterialId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM training_materials WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
