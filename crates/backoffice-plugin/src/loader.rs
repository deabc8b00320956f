//! Extension loader: resolves a slug to a running instance.
//!
//! Each extension directory must contain an entry file named after the
//! slug (`hello-world/HelloWorldPlugin.so`). Instances come from a factory
//! table keyed by slug; with the `dynamic` feature an entry file that is a
//! shared library is opened instead when no factory is registered. The
//! first successful load of a slug is kept for the life of the loader.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use backoffice_core::config::extensions::ExtensionConfig;
use backoffice_core::error::{AppError, ErrorKind};
use backoffice_core::result::AppResult;
use backoffice_entity::extension::descriptor::is_valid_slug;

use crate::extension::Extension;
use crate::hooks::InstanceId;
use crate::hooks::dispatcher::panic_message;

/// Produces a fresh extension instance.
pub type ExtensionFactory = Arc<dyn Fn() -> AppResult<Arc<dyn Extension>> + Send + Sync>;

/// Entry point identifier for `slug`: `hello-world` becomes `HelloWorldPlugin`.
pub fn class_identifier(slug: &str) -> String {
    let mut identifier: String = slug
        .split('-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    identifier.push_str("Plugin");
    identifier
}

/// A loaded extension instance.
#[derive(Clone)]
pub struct LoadedExtension {
    /// Process-unique identity, owner of every hook this instance registers.
    pub id: InstanceId,
    /// Slug the instance was loaded for.
    pub slug: String,
    /// The instance itself.
    pub instance: Arc<dyn Extension>,
}

impl fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("id", &self.id)
            .field("slug", &self.slug)
            .field("instance", &self.instance)
            .finish()
    }
}

/// Resolves slugs to instances and keeps them for reuse.
pub struct ExtensionLoader {
    root: PathBuf,
    entry_extension: String,
    factories: HashMap<String, ExtensionFactory>,
    loaded: RwLock<HashMap<String, LoadedExtension>>,
    #[cfg(feature = "dynamic")]
    libraries: dynamic::LibraryCache,
}

impl ExtensionLoader {
    /// Creates a loader for the directory layout in `config`.
    pub fn new(config: &ExtensionConfig) -> Self {
        Self {
            root: config.directory.clone(),
            entry_extension: config.entry_extension.clone(),
            factories: HashMap::new(),
            loaded: RwLock::new(HashMap::new()),
            #[cfg(feature = "dynamic")]
            libraries: dynamic::LibraryCache::default(),
        }
    }

    /// Registers the factory used to instantiate `slug`.
    pub fn with_factory(mut self, slug: impl Into<String>, factory: ExtensionFactory) -> Self {
        self.factories.insert(slug.into(), factory);
        self
    }

    /// Root directory holding one sub-directory per extension.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `slug`.
    pub fn extension_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    /// Path of the entry file for `slug`.
    pub fn entry_path(&self, slug: &str) -> PathBuf {
        self.extension_dir(slug).join(format!(
            "{}.{}",
            class_identifier(slug),
            self.entry_extension
        ))
    }

    /// Whether a factory is registered for `slug`.
    pub fn has_factory(&self, slug: &str) -> bool {
        self.factories.contains_key(slug)
    }

    /// Returns the instance for `slug`, loading it on first use.
    ///
    /// Failures leave nothing cached, so a later call retries.
    pub async fn try_load(&self, slug: &str) -> AppResult<LoadedExtension> {
        if let Some(loaded) = self.get(slug).await {
            return Ok(loaded);
        }

        if !is_valid_slug(slug) {
            return Err(AppError::validation(format!(
                "'{slug}' is not a valid extension slug"
            )));
        }

        let entry = self.entry_path(slug);
        tokio::fs::File::open(&entry).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Plugin,
                format!(
                    "Entry file for extension '{slug}' is missing or unreadable: {}",
                    entry.display()
                ),
                e,
            )
        })?;

        let instance = self.instantiate(slug, &entry).await?;

        let mut loaded = self.loaded.write().await;
        // Another task may have finished loading first; keep its instance.
        let loaded = loaded
            .entry(slug.to_string())
            .or_insert_with(|| LoadedExtension {
                id: InstanceId::new(),
                slug: slug.to_string(),
                instance,
            })
            .clone();

        info!(slug, instance = %loaded.id, "Extension loaded");
        Ok(loaded)
    }

    /// Like [`try_load`](Self::try_load), logging the failure instead of
    /// returning it.
    pub async fn load(&self, slug: &str) -> Option<LoadedExtension> {
        match self.try_load(slug).await {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                warn!(slug, error = %e, "Extension unavailable");
                None
            }
        }
    }

    /// The cached instance for `slug`, without loading.
    pub async fn get(&self, slug: &str) -> Option<LoadedExtension> {
        self.loaded.read().await.get(slug).cloned()
    }

    /// Every cached instance, ordered by slug.
    pub async fn loaded(&self) -> Vec<LoadedExtension> {
        let loaded = self.loaded.read().await;
        let mut all: Vec<LoadedExtension> = loaded.values().cloned().collect();
        all.sort_by(|a, b| a.slug.cmp(&b.slug));
        all
    }

    /// Drops the cached instance for `slug`.
    pub async fn evict(&self, slug: &str) -> Option<LoadedExtension> {
        let evicted = self.loaded.write().await.remove(slug);
        if evicted.is_some() {
            debug!(slug, "Extension instance evicted");
        }
        evicted
    }

    /// Drops every cached instance.
    pub async fn clear(&self) {
        self.loaded.write().await.clear();
    }

    /// Contents of `<slug>/db/*.sql`, ordered by file name.
    ///
    /// A missing `db` directory means no scripts.
    pub async fn setup_scripts(&self, slug: &str) -> AppResult<Vec<(String, String)>> {
        let dir = self.extension_dir(slug).join("db");

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read {}", dir.display()),
                    e,
                ));
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "sql") && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut scripts = Vec::with_capacity(paths.len());
        for path in paths {
            let sql = tokio::fs::read_to_string(&path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            scripts.push((name, sql));
        }

        Ok(scripts)
    }

    async fn instantiate(&self, slug: &str, entry: &Path) -> AppResult<Arc<dyn Extension>> {
        if let Some(factory) = self.factories.get(slug) {
            return catch_unwind(AssertUnwindSafe(|| factory())).unwrap_or_else(|panic| {
                Err(AppError::plugin(format!(
                    "Factory for extension '{slug}' panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        }

        #[cfg(feature = "dynamic")]
        let instance = self.libraries.open(slug, entry).await;

        #[cfg(not(feature = "dynamic"))]
        let instance = Err(AppError::plugin(format!(
            "No factory registered for extension '{slug}' (entry {})",
            entry.display()
        )));

        instance
    }
}

impl fmt::Debug for ExtensionLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut factories: Vec<&String> = self.factories.keys().collect();
        factories.sort();
        f.debug_struct("ExtensionLoader")
            .field("root", &self.root)
            .field("entry_extension", &self.entry_extension)
            .field("factories", &factories)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "dynamic")]
mod dynamic {
    use std::collections::HashMap;
    use std::collections::hash_map::Entry;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use tokio::sync::Mutex;
    use tracing::{debug, info};

    use backoffice_core::error::{AppError, ErrorKind};
    use backoffice_core::result::AppResult;

    use crate::extension::Extension;

    /// Symbol exported by [`declare_extension!`](crate::declare_extension).
    pub const CREATE_SYMBOL: &[u8] = b"create_extension";

    /// Signature of the exported constructor.
    pub type CreateExtensionFn = unsafe extern "C" fn() -> *mut Box<dyn Extension>;

    /// Libraries opened so far, one per entry file. They stay mapped while
    /// instances may run.
    #[derive(Default)]
    pub struct LibraryCache {
        libraries: Mutex<HashMap<PathBuf, libloading::Library>>,
    }

    impl LibraryCache {
        /// Opens the shared library at `path`, or reuses the handle from an
        /// earlier load, and calls its constructor.
        ///
        /// Loads arbitrary native code; only trusted directories should be
        /// configured as the extension root.
        pub async fn open(&self, slug: &str, path: &Path) -> AppResult<Arc<dyn Extension>> {
            let mut libraries = self.libraries.lock().await;

            let library = match libraries.entry(path.to_path_buf()) {
                Entry::Occupied(entry) => {
                    debug!(slug, path = %path.display(), "Reusing opened extension library");
                    entry.into_mut()
                }
                Entry::Vacant(entry) => {
                    let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
                        AppError::with_source(
                            ErrorKind::Plugin,
                            format!("Failed to open library for extension '{slug}'"),
                            e,
                        )
                    })?;
                    info!(slug, path = %path.display(), "Dynamic extension library opened");
                    entry.insert(library)
                }
            };

            let instance = {
                let create: libloading::Symbol<'_, CreateExtensionFn> =
                    unsafe { library.get(CREATE_SYMBOL) }.map_err(|e| {
                        AppError::with_source(
                            ErrorKind::Plugin,
                            format!("Extension '{slug}' does not export create_extension"),
                            e,
                        )
                    })?;

                let raw = unsafe { create() };
                if raw.is_null() {
                    return Err(AppError::plugin(format!(
                        "Extension '{slug}' constructor returned null"
                    )));
                }
                let boxed = unsafe { Box::from_raw(raw) };
                Arc::<dyn Extension>::from(*boxed)
            };

            Ok(instance)
        }

        #[cfg(test)]
        pub async fn len(&self) -> usize {
            self.libraries.lock().await.len()
        }
    }
}
