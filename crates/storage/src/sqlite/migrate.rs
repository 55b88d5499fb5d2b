use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS sites (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            company TEXT NOT NULL CHECK (company IN ('mirae_abm', 'dawon_pmc')),
            address TEXT,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            phone TEXT,
            role TEXT NOT NULL CHECK (role IN ('admin', 'guard')),
            company TEXT,
            site_id TEXT,
            password_salt TEXT,
            password_digest TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (site_id) REFERENCES sites(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS training_materials (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            kind TEXT NOT NULL CHECK (kind IN ('card', 'video')),
            month TEXT NOT NULL,
            card_images TEXT,
            audio_urls TEXT,
            video_urls TEXT,
            quizzes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS training_records (
            id TEXT PRIMARY KEY,
            guard_id TEXT NOT NULL,
            material_id TEXT NOT NULL,
            material_kind TEXT NOT NULL,
            material_title TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            score INTEGER CHECK (score BETWEEN 0 AND 100),
            passed INTEGER,
            FOREIGN KEY (guard_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (material_id) REFERENCES training_materials(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            guard_id TEXT NOT NULL,
            material_id TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (guard_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (material_id) REFERENCES training_materials(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_users_role_phone
            ON users (role, phone);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_records_guard_completed
            ON training_records (guard_id, completed_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_notifications_guard_created
            ON notifications (guard_id, created_at);
    ",
];

/// Applies the versioned schema. Each version runs in one transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
