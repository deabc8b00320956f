//! The persistent extension registry seen by the extension manager.

use async_trait::async_trait;

use backoffice_core::result::AppResult;
use backoffice_entity::extension::{ExtensionRecord, ExtensionSetting, UpsertExtension};

/// Durable storage of extension records and their settings.
///
/// [`ExtensionRepository`](crate::ExtensionRepository) is the PostgreSQL
/// implementation; tests substitute an in-memory one.
#[async_trait]
pub trait ExtensionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a record by slug.
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<ExtensionRecord>>;

    /// All records ordered by slug.
    async fn find_all(&self) -> AppResult<Vec<ExtensionRecord>>;

    /// Slugs of active records ordered by slug.
    async fn active_slugs(&self) -> AppResult<Vec<String>>;

    /// Insert a new inactive record, or refresh metadata of an existing
    /// one without touching its activation state.
    async fn upsert(&self, data: &UpsertExtension) -> AppResult<ExtensionRecord>;

    /// Set the activation flag. Returns `false` if no record matched.
    async fn set_active(&self, slug: &str, active: bool) -> AppResult<bool>;

    /// Delete an inactive record together with its settings, atomically.
    ///
    /// Returns `false` without deleting anything when the record is
    /// missing or active.
    async fn delete_inactive(&self, slug: &str) -> AppResult<bool>;

    /// Execute an extension-supplied setup script.
    async fn run_setup_script(&self, slug: &str, sql: &str) -> AppResult<()>;

    /// Read one setting.
    async fn get_setting(&self, slug: &str, key: &str) -> AppResult<Option<serde_json::Value>>;

    /// All settings of an extension ordered by key.
    async fn list_settings(&self, slug: &str) -> AppResult<Vec<ExtensionSetting>>;

    /// Insert or overwrite a setting.
    async fn put_setting(&self, slug: &str, key: &str, value: &serde_json::Value)
    -> AppResult<()>;

    /// Insert a setting only if the key is absent. Returns `true` if inserted.
    async fn seed_setting(
        &self,
        slug: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> AppResult<bool>;

    /// Delete a setting. Returns `true` if a row was removed.
    async fn delete_setting(&self, slug: &str, key: &str) -> AppResult<bool>;
}
