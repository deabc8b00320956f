//! Extension descriptor read from a manifest file.
//!
//! A manifest is a JSON object shipped in each extension directory:
//!
//! ```json
//! { "slug": "hello-world", "name": "Hello World", "version": "1.0.0" }
//! ```
//!
//! Every field is optional on disk. `slug` falls back to the directory
//! name, `name` to the slug, and `version` to `"1.0.0"`. A declared slug
//! must equal the directory name: code, setup scripts and uninstall all
//! resolve an extension's files as `<root>/<slug>`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Version assumed when a manifest omits one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Raw manifest document as it appears on disk.
#[derive(Debug, Clone, Default, Deserialize)]
struct Manifest {
    slug: Option<String>,
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    supports_customization: bool,
    settings: Option<serde_json::Value>,
}

/// A discovered extension candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    /// Unique kebab-case identifier.
    pub slug: String,
    /// Human-readable name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Short description.
    pub description: String,
    /// Author or maintainer.
    pub author: String,
    /// Whether the extension offers a customization screen.
    pub supports_customization: bool,
    /// Default settings, copied into the registry at install time.
    pub settings: Option<serde_json::Value>,
    /// Directory the manifest was read from.
    pub path: PathBuf,
}

impl ExtensionDescriptor {
    /// Parses a manifest document found in `dir`.
    ///
    /// `dir_name` is the directory's file name, used when the manifest
    /// carries no slug of its own and required to match one it declares.
    pub fn parse(dir_name: &str, dir: PathBuf, json: &str) -> Result<Self, String> {
        let manifest: Manifest =
            serde_json::from_str(json).map_err(|e| format!("invalid manifest JSON: {e}"))?;

        let slug = manifest
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| dir_name.to_string());

        if !is_valid_slug(&slug) {
            return Err(format!("slug '{slug}' is not kebab-case"));
        }

        if slug != dir_name {
            return Err(format!(
                "slug '{slug}' does not match its directory '{dir_name}'"
            ));
        }

        if let Some(settings) = &manifest.settings {
            if !settings.is_object() {
                return Err("'settings' must be a JSON object".to_string());
            }
        }

        Ok(Self {
            name: manifest.name.unwrap_or_else(|| slug.clone()),
            version: manifest
                .version
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            description: manifest.description,
            author: manifest.author,
            supports_customization: manifest.supports_customization,
            settings: manifest.settings,
            path: dir,
            slug,
        })
    }
}

/// Returns `true` for lowercase ASCII words joined by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}
