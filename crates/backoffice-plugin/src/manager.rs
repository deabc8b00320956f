//! Extension manager: discovery plus the install / activate / deactivate /
//! uninstall state machine.
//!
//! ```text
//! Absent --install--> Installed --activate--> Active
//!    ^                    |  ^                   |
//!    +-----uninstall------+  +----deactivate-----+
//! ```
//!
//! The persistent store is the source of truth for activation state. Every
//! mutation forgets the cache keys that depend on it, then fires the
//! matching lifecycle hook with the slug as payload. Lifecycle hooks run
//! after the lifecycle lock is released, so callbacks may call back into
//! the manager.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use backoffice_cache::{CacheManager, keys};
use backoffice_core::config::extensions::ExtensionConfig;
use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;
use backoffice_database::ExtensionStore;
use backoffice_entity::extension::{
    ExtensionDescriptor, ExtensionRecord, ExtensionSetting, UpsertExtension,
};

use crate::discovery::ManifestScanner;
use crate::extension::ExtensionContext;
use crate::hooks::dispatcher::panic_message;
use crate::hooks::{HookDispatcher, HookRegistry, names};
use crate::loader::{ExtensionLoader, LoadedExtension};

/// Per-process bookkeeping, rebuilt by [`ExtensionManager::reset`].
#[derive(Debug, Default)]
struct ManagerState {
    /// Slugs whose init capability already ran.
    initialized: HashSet<String>,
}

/// Coordinates discovery, the persistent registry, the cache, the loader,
/// and the hook dispatcher.
#[derive(Debug)]
pub struct ExtensionManager {
    config: ExtensionConfig,
    scanner: ManifestScanner,
    loader: Arc<ExtensionLoader>,
    store: Arc<dyn ExtensionStore>,
    cache: CacheManager,
    hooks: Arc<HookRegistry>,
    dispatcher: Arc<HookDispatcher>,
    state: Mutex<ManagerState>,
    /// Serializes lifecycle mutations within this process.
    lifecycle: Mutex<()>,
}

impl ExtensionManager {
    /// Creates a manager over its collaborators with an empty hook table.
    pub fn new(
        config: ExtensionConfig,
        loader: Arc<ExtensionLoader>,
        store: Arc<dyn ExtensionStore>,
        cache: CacheManager,
    ) -> Self {
        let hooks = Arc::new(HookRegistry::new());
        let dispatcher = Arc::new(HookDispatcher::new(Arc::clone(&hooks)));

        Self {
            scanner: ManifestScanner::new(&config),
            config,
            loader,
            store,
            cache,
            hooks,
            dispatcher,
            state: Mutex::new(ManagerState::default()),
            lifecycle: Mutex::new(()),
        }
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// Every extension with a well-formed manifest, ordered by directory.
    pub async fn discover(&self) -> AppResult<Vec<ExtensionDescriptor>> {
        self.remember(&keys::discovered(), || self.scanner.scan())
            .await
    }

    /// Re-reads the extensions root, replacing the cached scan.
    pub async fn rescan(&self) -> AppResult<Vec<ExtensionDescriptor>> {
        self.cache.forget(&keys::discovered()).await;
        self.discover().await
    }

    /// Alias of [`discover`](Self::discover).
    pub async fn get_all(&self) -> AppResult<Vec<ExtensionDescriptor>> {
        self.discover().await
    }

    /// Descriptor of `slug` from the manifest store.
    pub async fn descriptor(&self, slug: &str) -> AppResult<Option<ExtensionDescriptor>> {
        self.remember(&keys::descriptor(slug), || self.scanner.find(slug))
            .await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Installs `slug` from its manifest, or refreshes its metadata.
    ///
    /// A first install runs the bundled `db/*.sql` scripts before the record
    /// exists, then the install capability; a re-install only refreshes the
    /// record and seeds any new default settings. A failed first install
    /// leaves no record behind, so retrying runs the scripts again.
    /// Activation state is never changed.
    pub async fn install(&self, slug: &str) -> AppResult<ExtensionRecord> {
        let record = {
            let _guard = self.lifecycle.lock().await;
            let installed = self.install_locked(slug).await;
            self.invalidate(slug).await;
            installed?
        };

        info!(slug, version = %record.version, "Extension installed");
        self.dispatcher
            .dispatch_action(names::EXTENSION_INSTALLED, Value::from(slug))
            .await;

        Ok(record)
    }

    /// Marks `slug` active, then runs its activate and init capabilities.
    ///
    /// The record stays active even when the code cannot be loaded.
    /// Activating an active extension does nothing.
    pub async fn activate(&self, slug: &str) -> AppResult<()> {
        {
            let _guard = self.lifecycle.lock().await;

            let record = self.require_record(slug).await?;
            if record.is_active {
                debug!(slug, "Extension already active");
                return Ok(());
            }

            if !self.store.set_active(slug, true).await? {
                return Err(Self::missing(slug));
            }
            self.invalidate(slug).await;

            match self.loader.load(slug).await {
                Some(loaded) => {
                    if let Some(cap) = loaded.instance.activatable() {
                        let ctx = self.context(&loaded);
                        run_capability(slug, "activate", cap.activate(&ctx)).await;
                    }
                    self.initialize(&loaded).await;
                }
                None => warn!(slug, "Extension activated but its code could not be loaded"),
            }
        }

        info!(slug, "Extension activated");
        self.dispatcher
            .dispatch_action(names::EXTENSION_ACTIVATED, Value::from(slug))
            .await;

        Ok(())
    }

    /// Runs the deactivate capability, marks `slug` inactive, and drops
    /// every hook its instance registered.
    ///
    /// Code that cannot be loaded registered no hooks, so the record is
    /// still marked inactive. Deactivating an inactive extension does
    /// nothing.
    pub async fn deactivate(&self, slug: &str) -> AppResult<()> {
        {
            let _guard = self.lifecycle.lock().await;

            let record = self.require_record(slug).await?;
            if !record.is_active {
                debug!(slug, "Extension already inactive");
                return Ok(());
            }

            let loaded = self.loader.load(slug).await;

            if let Some(loaded) = &loaded {
                if let Some(cap) = loaded.instance.deactivatable() {
                    let ctx = self.context(loaded);
                    run_capability(slug, "deactivate", cap.deactivate(&ctx)).await;
                }
            }

            if !self.store.set_active(slug, false).await? {
                return Err(Self::missing(slug));
            }

            if let Some(loaded) = &loaded {
                let removed = self.hooks.remove_owner(loaded.id).await;
                debug!(slug, removed, "Extension hooks removed");
            }
            self.state.lock().await.initialized.remove(slug);
            self.invalidate(slug).await;
        }

        info!(slug, "Extension deactivated");
        self.dispatcher
            .dispatch_action(names::EXTENSION_DEACTIVATED, Value::from(slug))
            .await;

        Ok(())
    }

    /// Removes an inactive extension: its settings, its record, its cached
    /// instance and, when configured, its directory `<root>/<slug>`.
    ///
    /// Fails with a conflict and changes nothing while the extension is
    /// active.
    pub async fn uninstall(&self, slug: &str) -> AppResult<()> {
        {
            let _guard = self.lifecycle.lock().await;

            let record = self.require_record(slug).await?;
            if record.is_active {
                return Err(AppError::conflict(format!(
                    "Extension '{slug}' is active; deactivate it before uninstalling"
                )));
            }

            if let Some(loaded) = self.loader.load(slug).await {
                if let Some(cap) = loaded.instance.uninstallable() {
                    let ctx = self.context(&loaded);
                    run_capability(slug, "uninstall", cap.uninstall(&ctx)).await;
                }
            }

            // The store re-checks the flag under a row lock.
            if !self.store.delete_inactive(slug).await? {
                return Err(AppError::conflict(format!(
                    "Extension '{slug}' changed state during uninstall"
                )));
            }

            if let Some(loaded) = self.loader.evict(slug).await {
                self.hooks.remove_owner(loaded.id).await;
            }
            self.state.lock().await.initialized.remove(slug);

            if self.config.remove_files_on_uninstall {
                let directory = self.loader.extension_dir(slug);
                match tokio::fs::remove_dir_all(&directory).await {
                    Ok(()) => debug!(slug, dir = %directory.display(), "Extension files removed"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(slug, dir = %directory.display(), error = %e, "Failed to remove extension files");
                    }
                }
            }

            self.invalidate(slug).await;
        }

        info!(slug, "Extension uninstalled");
        self.dispatcher
            .dispatch_action(names::EXTENSION_UNINSTALLED, Value::from(slug))
            .await;

        Ok(())
    }

    // ── Runtime ──────────────────────────────────────────────────────

    /// Loads every active extension and runs its init capability once.
    ///
    /// Returns the number of active extensions that are loaded.
    pub async fn boot(&self) -> AppResult<usize> {
        let mut count = 0;
        for slug in self.active_slugs().await? {
            if let Some(loaded) = self.loader.load(&slug).await {
                self.initialize(&loaded).await;
                count += 1;
            }
        }

        info!(loaded = count, "Active extensions booted");
        Ok(count)
    }

    /// Clears the hook table, cached instances, and init bookkeeping so the
    /// next [`boot`](Self::boot) starts from scratch.
    pub async fn reset(&self) {
        self.hooks.clear().await;
        self.loader.clear().await;
        self.state.lock().await.initialized.clear();
        debug!("Extension runtime state reset");
    }

    /// Whether `slug` is installed and active.
    pub async fn is_active(&self, slug: &str) -> AppResult<bool> {
        Ok(self.active_slugs().await?.iter().any(|s| s == slug))
    }

    /// Slugs of active extensions, ordered by slug.
    pub async fn active_slugs(&self) -> AppResult<Vec<String>> {
        self.remember(&keys::active_slugs(), || self.store.active_slugs())
            .await
    }

    /// The loaded instance of `slug`, if it has been loaded.
    pub async fn get(&self, slug: &str) -> Option<LoadedExtension> {
        self.loader.get(slug).await
    }

    /// Loaded instances of every active extension whose code is available.
    pub async fn get_active(&self) -> AppResult<BTreeMap<String, LoadedExtension>> {
        let mut active = BTreeMap::new();
        for slug in self.active_slugs().await? {
            if let Some(loaded) = self.loader.load(&slug).await {
                active.insert(slug, loaded);
            }
        }
        Ok(active)
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// All persisted records, ordered by slug.
    pub async fn records(&self) -> AppResult<Vec<ExtensionRecord>> {
        self.store.find_all().await
    }

    /// The persisted record of `slug`.
    pub async fn record(&self, slug: &str) -> AppResult<Option<ExtensionRecord>> {
        self.remember(&keys::record(slug), || self.store.find_by_slug(slug))
            .await
    }

    /// One setting of `slug`.
    pub async fn setting(&self, slug: &str, key: &str) -> AppResult<Option<Value>> {
        self.store.get_setting(slug, key).await
    }

    /// Every setting of `slug`, ordered by key.
    pub async fn settings(&self, slug: &str) -> AppResult<Vec<ExtensionSetting>> {
        self.store.list_settings(slug).await
    }

    /// Writes a setting of an installed extension.
    pub async fn set_setting(&self, slug: &str, key: &str, value: &Value) -> AppResult<()> {
        self.require_record(slug).await?;
        self.store.put_setting(slug, key, value).await?;
        self.invalidate(slug).await;
        debug!(slug, key, "Extension setting written");
        Ok(())
    }

    /// Deletes a setting. Returns `false` if it did not exist.
    pub async fn delete_setting(&self, slug: &str, key: &str) -> AppResult<bool> {
        let removed = self.store.delete_setting(slug, key).await?;
        if removed {
            self.invalidate(slug).await;
        }
        Ok(removed)
    }

    // ── Cache ────────────────────────────────────────────────────────

    /// Memoizes a value computed from the active set (menus, route
    /// tables, ...). Forgotten on every lifecycle mutation.
    pub async fn remember_derived<T, F, Fut>(&self, name: &str, producer: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.remember(&keys::derived(name), producer).await
    }

    /// Forgets every cache key that depends on `slug` or on the active set.
    pub async fn invalidate(&self, slug: &str) {
        self.cache.forget(&keys::active_slugs()).await;
        self.cache.forget(&keys::discovered()).await;
        self.cache.forget(&keys::descriptor(slug)).await;
        self.cache.forget(&keys::record(slug)).await;
        let derived = self.cache.forget_pattern(&keys::derived_pattern()).await;
        debug!(slug, derived, "Extension caches invalidated");
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Dispatcher for firing hooks.
    pub fn dispatcher(&self) -> &Arc<HookDispatcher> {
        &self.dispatcher
    }

    /// Hook registry shared with loaded extensions.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// The extension loader.
    pub fn loader(&self) -> &Arc<ExtensionLoader> {
        &self.loader
    }

    /// Extension configuration.
    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    // ── Internals ────────────────────────────────────────────────────

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache_ttl_seconds)
    }

    async fn remember<T, F, Fut>(&self, key: &str, producer: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.cache.remember_json(key, self.ttl(), producer).await
    }

    fn context(&self, loaded: &LoadedExtension) -> ExtensionContext {
        ExtensionContext::new(&loaded.slug, loaded.id, Arc::clone(&self.hooks))
    }

    /// Runs the init capability of `loaded` unless it already ran.
    ///
    /// A failed init is not retried; hooks it managed to register are
    /// removed.
    async fn initialize(&self, loaded: &LoadedExtension) {
        {
            let mut state = self.state.lock().await;
            if !state.initialized.insert(loaded.slug.clone()) {
                return;
            }
        }

        let Some(cap) = loaded.instance.initializable() else {
            return;
        };

        let ctx = self.context(loaded);
        if !run_capability(&loaded.slug, "init", cap.init(&ctx)).await {
            let removed = self.hooks.remove_owner(loaded.id).await;
            debug!(slug = %loaded.slug, removed, "Hooks of failed init removed");
        }
    }

    async fn install_locked(&self, slug: &str) -> AppResult<ExtensionRecord> {
        // Read the disk directly: a cached scan may predate the manifest.
        let descriptor = self.scanner.find(slug).await?.ok_or_else(|| {
            AppError::not_found(format!("No manifest found for extension '{slug}'"))
        })?;

        let existed = self.store.find_by_slug(slug).await?.is_some();

        if !existed {
            for (name, sql) in self.loader.setup_scripts(slug).await? {
                self.store.run_setup_script(slug, &sql).await?;
                info!(slug, script = %name, "Extension setup script executed");
            }
        }

        let record = self
            .store
            .upsert(&UpsertExtension::from(&descriptor))
            .await?;

        if let Err(e) = self.seed_defaults(slug, &descriptor).await {
            if !existed {
                match self.store.delete_inactive(slug).await {
                    Ok(_) => debug!(slug, "Partial install rolled back"),
                    Err(cleanup) => {
                        error!(slug, error = %cleanup, "Failed to roll back partial install");
                    }
                }
            }
            return Err(e);
        }

        if !existed {
            if let Some(loaded) = self.loader.load(slug).await {
                if let Some(cap) = loaded.instance.installable() {
                    let ctx = self.context(&loaded);
                    run_capability(slug, "install", cap.install(&ctx)).await;
                }
            }
        }

        Ok(record)
    }

    async fn seed_defaults(&self, slug: &str, descriptor: &ExtensionDescriptor) -> AppResult<()> {
        if let Some(Value::Object(defaults)) = &descriptor.settings {
            for (key, value) in defaults {
                if self.store.seed_setting(slug, key, value).await? {
                    debug!(slug, key = %key, "Default setting seeded");
                }
            }
        }
        Ok(())
    }

    async fn require_record(&self, slug: &str) -> AppResult<ExtensionRecord> {
        self.store
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| Self::missing(slug))
    }

    fn missing(slug: &str) -> AppError {
        AppError::not_found(format!("Extension '{slug}' is not installed"))
    }
}

/// Awaits one capability of `slug`. Errors and panics are logged, never
/// propagated; returns whether the step succeeded.
async fn run_capability<F>(slug: &str, step: &'static str, capability: F) -> bool
where
    F: Future<Output = AppResult<()>>,
{
    match AssertUnwindSafe(capability).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(slug, step, error = %e, "Extension capability failed");
            false
        }
        Err(panic) => {
            error!(slug, step, panic = %panic_message(panic.as_ref()), "Extension capability panicked");
            false
        }
    }
}
