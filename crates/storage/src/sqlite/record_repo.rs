use training_core::model::{CompletionRecord, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_record_row};
use crate::repository::{CompletionRepository, StorageError};

const RECORD_COLUMNS: &str = "id, guard_id, material_id, material_kind, material_title, \
                              completed_at, score, passed";

#[async_trait::async_trait]
impl CompletionRepository for SqliteRepository {
    async fn insert_record(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO training_records (
                id, guard_id, material_id, material_kind, material_title,
                completed_at, score, passed
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.id.to_string())
        .bind(record.guard_id.to_string())
        .bind(record.material_id.to_string())
        .bind(record.material_kind.as_str())
        .bind(&record.material_title)
        .bind(record.completed_at)
        .bind(record.score.map(i64::from))
        .bind(record.passed.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<CompletionRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM training_records ORDER BY completed_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_record_row).collect()
    }

    async fn list_records_for_guard(
        &self,
        guard_id: UserId,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM training_records WHERE guard_id = ?1 \
             ORDER BY completed_at DESC"
        ))
        .bind(guard_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_record_row).collect()
    }
}
