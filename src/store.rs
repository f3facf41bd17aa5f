// src/store.rs

use serde::{Serialize, de::DeserializeOwned};
use sqlx::SqlitePool;

use crate::error::AppError;

/// Key schema of the local progress cache.
pub mod keys {
    pub const HIGHEST_UNLOCKED_LEVEL: &str = "highestUnlockedLevel";
    pub const TOTAL_XP: &str = "totalXP";
    pub const SOUND_ENABLED: &str = "soundEnabled";
    pub const COMPLETED_LEVELS: &str = "completedLevels";
    pub const CURRENT_STREAK: &str = "currentStreak";
    pub const HEARTS: &str = "hearts";
    pub const LAST_ACTIVITY_DATE: &str = "lastActivityDate";
    pub const PENDING_COMPLETIONS: &str = "pendingCompletions";
    pub const REJECTED_COMPLETIONS: &str = "rejectedCompletions";
}

/// Typed, corruption-tolerant access to the device-local key/value store.
///
/// Values are stored as JSON text in the `kv_store` table. Reads fall back to
/// the supplied default on any problem, and writes log failures instead of
/// returning them: the local cache is best-effort, the backend is authoritative.
/// Writes across several keys are not transactional.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations against the pool.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Reads and deserializes `key`.
    ///
    /// Returns `default` when the key is missing, the stored text is not valid
    /// JSON, the JSON has the wrong shape, or the query itself fails.
    pub async fn read_field<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let raw = match self.read_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(e) => {
                tracing::warn!("Failed to read local field '{}': {}", key, e);
                return default;
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Discarding corrupt local field '{}': {}", key, e);
                default
            }
        }
    }

    /// Serializes and stores `value` under `key`.
    pub async fn write_field<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_write(key, value).await {
            tracing::error!("Failed to persist local field '{}': {}", key, e);
        }
    }

    pub async fn remove_field(&self, key: &str) {
        if let Err(e) = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
        {
            tracing::error!("Failed to remove local field '{}': {}", key, e);
        }
    }

    /// Drops every cached field (logout / account switch).
    pub async fn clear(&self) {
        if let Err(e) = sqlx::query("DELETE FROM kv_store").execute(&self.pool).await {
            tracing::error!("Failed to clear local store: {}", e);
        }
    }

    async fn read_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        let raw = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(raw)
    }

    async fn try_write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let encoded = serde_json::to_string(value)?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(encoded)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
