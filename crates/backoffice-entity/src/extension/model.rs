//! Persisted extension record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::descriptor::ExtensionDescriptor;

/// A row of the `extensions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExtensionRecord {
    /// Primary key.
    pub id: Uuid,
    /// Unique extension slug.
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Installed version string.
    pub version: String,
    /// Author or maintainer.
    pub author: String,
    /// Whether the extension participates in hook dispatch.
    pub is_active: bool,
    /// Default settings copied from the manifest at install time.
    pub settings: serde_json::Value,
    /// When the extension was first installed.
    pub installed_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

/// Data written when installing (or re-installing) an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertExtension {
    /// Unique extension slug.
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Version string.
    pub version: String,
    /// Author or maintainer.
    pub author: String,
    /// Default settings object.
    pub settings: serde_json::Value,
}

impl From<&ExtensionDescriptor> for UpsertExtension {
    fn from(descriptor: &ExtensionDescriptor) -> Self {
        Self {
            slug: descriptor.slug.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            version: descriptor.version.clone(),
            author: descriptor.author.clone(),
            settings: descriptor
                .settings
                .clone()
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
        }
    }
}
