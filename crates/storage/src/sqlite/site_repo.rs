use training_core::model::{Site, SiteId};

use super::SqliteRepository;
use super::mapping::{db_err, map_site_row};
use crate::repository::{SiteRepository, StorageError};

#[async_trait::async_trait]
impl SiteRepository for SqliteRepository {
    async fn insert_site(&self, site: &Site) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sites (id, name, company, address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(site.id.to_string())
        .bind(&site.name)
        .bind(site.company.as_str())
        .bind(&site.address)
        .bind(site.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_site(&self, site: &Site) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE sites SET name = ?2, company = ?3, address = ?4 WHERE id = ?1",
        )
        .bind(site.id.to_string())
        .bind(&site.name)
        .bind(site.company.as_str())
        .bind(&site.address)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_site(&self, id: SiteId) -> Result<Option<Site>, StorageError> {
        let row = sqlx::query(
            "SELECT id, name, company, address, created_at FROM sites WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_site_row).transpose()
    }

    async fn list_sites(&self) -> Result<Vec<Site>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, name, company, address, created_at FROM sites ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_site_row).collect()
    }

    async fn delete_site(&self, id: SiteId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM sites WHERE id = ?1")
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
