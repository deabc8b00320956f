//! Extension registry repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use backoffice_core::error::{AppError, ErrorKind};
use backoffice_core::result::AppResult;
use backoffice_entity::extension::{ExtensionRecord, ExtensionSetting, UpsertExtension};

use crate::store::ExtensionStore;

/// Repository for the `extensions` and `extension_settings` tables.
#[derive(Debug, Clone)]
pub struct ExtensionRepository {
    pool: PgPool,
}

impl ExtensionRepository {
    /// Create a new extension repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExtensionStore for ExtensionRepository {
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<ExtensionRecord>> {
        sqlx::query_as::<_, ExtensionRecord>("SELECT * FROM extensions WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find extension by slug", e)
            })
    }

    async fn find_all(&self) -> AppResult<Vec<ExtensionRecord>> {
        sqlx::query_as::<_, ExtensionRecord>("SELECT * FROM extensions ORDER BY slug")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list extensions", e))
    }

    async fn active_slugs(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT slug FROM extensions WHERE is_active = TRUE ORDER BY slug",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list active extensions", e)
        })
    }

    async fn upsert(&self, data: &UpsertExtension) -> AppResult<ExtensionRecord> {
        sqlx::query_as::<_, ExtensionRecord>(
            r#"INSERT INTO extensions
                (id, slug, name, description, version, author, is_active, settings,
                 installed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, NOW(), NOW())
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                version = EXCLUDED.version,
                author = EXCLUDED.author,
                settings = EXCLUDED.settings,
                updated_at = NOW()
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.slug)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.version)
        .bind(&data.author)
        .bind(&data.settings)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert extension", e))
    }

    async fn set_active(&self, slug: &str, active: bool) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE extensions SET is_active = $1, updated_at = NOW() WHERE slug = $2",
        )
        .bind(active)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update extension state", e)
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_inactive(&self, slug: &str) -> AppResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        // Row lock keeps a concurrent activation from slipping in between
        // the check and the delete.
        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM extensions WHERE slug = $1 FOR UPDATE")
                .bind(slug)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to lock extension row", e)
                })?;

        if active != Some(false) {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        let settings = sqlx::query("DELETE FROM extension_settings WHERE extension_slug = $1")
            .bind(slug)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete extension settings", e)
            })?;

        sqlx::query("DELETE FROM extensions WHERE slug = $1 AND is_active = FALSE")
            .bind(slug)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete extension", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit extension removal", e)
        })?;

        debug!(slug, settings = settings.rows_affected(), "Extension rows deleted");
        Ok(true)
    }

    async fn run_setup_script(&self, slug: &str, sql: &str) -> AppResult<()> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Setup script for extension '{slug}' failed: {e}"),
                    e,
                )
            })?;
        Ok(())
    }

    async fn get_setting(&self, slug: &str, key: &str) -> AppResult<Option<serde_json::Value>> {
        sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT setting_value FROM extension_settings \
             WHERE extension_slug = $1 AND setting_key = $2",
        )
        .bind(slug)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read setting", e))
    }

    async fn list_settings(&self, slug: &str) -> AppResult<Vec<ExtensionSetting>> {
        sqlx::query_as::<_, ExtensionSetting>(
            "SELECT * FROM extension_settings WHERE extension_slug = $1 ORDER BY setting_key",
        )
        .bind(slug)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list settings", e))
    }

    async fn put_setting(
        &self,
        slug: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO extension_settings (id, extension_slug, setting_key, setting_value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (extension_slug, setting_key)
            DO UPDATE SET setting_value = EXCLUDED.setting_value"#,
        )
        .bind(Uuid::new_v4())
        .bind(slug)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to write setting", e))?;
        Ok(())
    }

    async fn seed_setting(
        &self,
        slug: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO extension_settings (id, extension_slug, setting_key, setting_value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (extension_slug, setting_key) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(slug)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to seed setting", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_setting(&self, slug: &str, key: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM extension_settings WHERE extension_slug = $1 AND setting_key = $2",
        )
        .bind(slug)
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete setting", e))?;

        Ok(result.rows_affected() > 0)
    }
}
