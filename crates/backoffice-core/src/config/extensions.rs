//! Extension system configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where extensions live on disk and how the manager treats them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Root directory holding one sub-directory per extension.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Manifest file name inside each extension directory.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    /// File extension of the entry point (`<Identifier>Plugin.<ext>`).
    #[serde(default = "default_entry_extension")]
    pub entry_extension: String,
    /// TTL for memoized discovery and registry lookups.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Delete the extension directory on uninstall.
    #[serde(default = "default_true")]
    pub remove_files_on_uninstall: bool,
    /// Load active extensions when the host starts.
    #[serde(default = "default_true")]
    pub boot_on_start: bool,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            manifest_file: default_manifest_file(),
            entry_extension: default_entry_extension(),
            cache_ttl_seconds: default_cache_ttl(),
            remove_files_on_uninstall: true,
            boot_on_start: true,
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from("./extensions")
}

fn default_manifest_file() -> String {
    "manifest.json".to_string()
}

fn default_entry_extension() -> String {
    std::env::consts::DLL_EXTENSION.to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}
