//! Per-extension key/value settings.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row of the `extension_settings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExtensionSetting {
    /// Primary key.
    pub id: Uuid,
    /// Owning extension slug.
    pub extension_slug: String,
    /// Setting key, unique per extension.
    pub setting_key: String,
    /// JSON value.
    pub setting_value: serde_json::Value,
}
