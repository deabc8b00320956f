//! Manifest discovery under the extensions root.

use std::path::PathBuf;

use tracing::{debug, warn};

use backoffice_core::config::extensions::ExtensionConfig;
use backoffice_core::error::{AppError, ErrorKind};
use backoffice_core::result::AppResult;
use backoffice_entity::extension::ExtensionDescriptor;

/// Reads one manifest per sub-directory of the extensions root.
#[derive(Debug, Clone)]
pub struct ManifestScanner {
    root: PathBuf,
    manifest_file: String,
}

impl ManifestScanner {
    /// Creates a scanner for the directory layout in `config`.
    pub fn new(config: &ExtensionConfig) -> Self {
        Self {
            root: config.directory.clone(),
            manifest_file: config.manifest_file.clone(),
        }
    }

    /// Descriptors for every directory with a well-formed manifest.
    ///
    /// Results are ordered by directory name, so slugs are unique. Directories
    /// without a manifest or with an unreadable or malformed one (including
    /// a declared slug other than the directory name) are skipped and
    /// logged. A missing root yields nothing.
    pub async fn scan(&self) -> AppResult<Vec<ExtensionDescriptor>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(root = %self.root.display(), "Extensions directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read extensions directory {}", self.root.display()),
                    e,
                ));
            }
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                dirs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }
        dirs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut descriptors = Vec::with_capacity(dirs.len());

        for (name, dir) in dirs {
            let manifest_path = dir.join(&self.manifest_file);
            let json = match tokio::fs::read_to_string(&manifest_path).await {
                Ok(json) => json,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(dir = %dir.display(), "No manifest, skipping directory");
                    continue;
                }
                Err(e) => {
                    warn!(path = %manifest_path.display(), error = %e, "Unreadable manifest");
                    continue;
                }
            };

            let descriptor = match ExtensionDescriptor::parse(&name, dir, &json) {
                Ok(descriptor) => descriptor,
                Err(reason) => {
                    warn!(path = %manifest_path.display(), reason = %reason, "Malformed manifest");
                    continue;
                }
            };

            descriptors.push(descriptor);
        }

        debug!(count = descriptors.len(), "Extension manifests scanned");
        Ok(descriptors)
    }

    /// The descriptor whose slug is `slug`, if any.
    pub async fn find(&self, slug: &str) -> AppResult<Option<ExtensionDescriptor>> {
        Ok(self.scan().await?.into_iter().find(|d| d.slug == slug))
    }
}
