use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod mapping;
mod material_repo;
mod migrate;
mod notification_repo;
mod record_repo;
mod session_repo;
mod site_repo;
mod user_repo;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// enforcing foreign key constraints fails during setup.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the training schema; safe to call on every start.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a schema statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Opens the database, migrates it, and shares one pool across every
    /// repository handle.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the pool or schema cannot be set up.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self {
            users: Arc::new(repo.clone()),
            sites: Arc::new(repo.clone()),
            materials: Arc::new(repo.clone()),
            records: Arc::new(repo.clone()),
            notifications: Arc::new(repo.clone()),
            sessions: Arc::new(repo),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let repo =
            SqliteRepository::connect("sqlite:file:memdb_migrate_twice?mode=memory&cache=shared")
                .await
                .unwrap();
        repo.migrate().await.unwrap();
        repo.migrate().await.unwrap();
        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(repo.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "notifications",
            "sessions",
            "sites",
            "training_materials",
            "training_records",
            "users",
        ] {
            assert!(names.contains(&expected), "missing table {expected}: {names:?}");
        }
    }
}
