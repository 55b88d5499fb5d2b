use training_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_credential_row, map_user_row};
use crate::repository::{Credential, StorageError, UserRepository};

const USER_COLUMNS: &str = "id, username, name, phone, role, company, site_id, created_at";

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (id, username, name, phone, role, company, site_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.company.map(|c| c.as_str()))
        .bind(user.site_id.map(|s| s.to_string()))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE users
            SET username = ?2, name = ?3, phone = ?4, role = ?5, company = ?6, site_id = ?7
            WHERE id = ?1
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.company.map(|c| c.as_str()))
        .bind(user.site_id.map(|s| s.to_string()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_guard_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = 'guard' AND phone = ?1 LIMIT 1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn list_guards(&self) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = 'guard' ORDER BY name ASC, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_user_row).collect()
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn credential(&self, id: UserId) -> Result<Option<Credential>, StorageError> {
        let row = sqlx::query("SELECT password_salt, password_digest FROM users WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(row) => map_credential_row(&row),
            None => Ok(None),
        }
    }

    async fn set_credential(
        &self,
        id: UserId,
        credential: &Credential,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE users SET password_salt = ?2, password_digest = ?3 WHERE id = ?1",
        )
        .bind(id.to_string())
        .bind(&credential.salt)
        .bind(&credential.digest)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn reassign_user_id(
        &self,
        old_id: UserId,
        new_id: UserId,
    ) -> Result<User, StorageError> {
        let old = old_id.to_string();
        let new = new_id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let taken = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
            .bind(&new)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if taken.is_some() {
            return Err(StorageError::Conflict(format!("user {new_id} already exists")));
        }

        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(&old)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or(StorageError::NotFound)?;
        let mut user = map_user_row(&row)?;

        // Park the old username so the copy can take it over.
        sqlx::query("UPDATE users SET username = 'username_old_' || id WHERE id = ?1")
            .bind(&old)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO users (
                id, username, name, phone, role, company, site_id,
                password_salt, password_digest, created_at
            )
            SELECT ?2, ?3, name, phone, role, company, site_id,
                   password_salt, password_digest, created_at
            FROM users WHERE id = ?1
            ",
        )
        .bind(&old)
        .bind(&new)
        .bind(&user.username)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for table in ["training_records", "notifications"] {
            sqlx::query(&format!(
                "UPDATE {table} SET guard_id = ?2 WHERE guard_id = ?1"
            ))
            .bind(&old)
            .bind(&new)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        sqlx::query("UPDATE sessions SET user_id = ?2 WHERE user_id = ?1")
            .bind(&old)
            .bind(&new)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(&old)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        user.id = new_id;
        Ok(user)
    }
}
