use training_core::model::{MaterialId, Notification, NotificationId, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_notification_row};
use crate::repository::{NotificationRepository, StorageError};

#[async_trait::async_trait]
impl NotificationRepository for SqliteRepository {
    async fn insert_notifications(&self, items: &[Notification]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for n in items {
            sqlx::query(
                r"
                INSERT INTO notifications (id, guard_id, material_id, is_read, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(n.id.to_string())
            .bind(n.guard_id.to_string())
            .bind(n.material_id.to_string())
            .bind(i64::from(n.is_read))
            .bind(n.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_for_guard(&self, guard_id: UserId) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, guard_id, material_id, is_read, created_at
            FROM notifications
            WHERE guard_id = ?1
            ORDER BY created_at DESC
            ",
        )
        .bind(guard_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_notification_row).collect()
    }

    async fn get_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StorageError> {
        let row = sqlx::query(
            "SELECT id, guard_id, material_id, is_read, created_at FROM notifications WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_notification_row).transpose()
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self, guard_id: UserId) -> Result<u64, StorageError> {
        let res =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE guard_id = ?1 AND is_read = 0")
                .bind(guard_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn delete_notification(&self, id: NotificationId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM notifications WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_for_material(
        &self,
        guard_id: UserId,
        material_id: MaterialId,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM notifications WHERE guard_id = ?1 AND material_id = ?2")
            .bind(guard_id.to_string())
            .bind(material_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
