//! Shared fixtures for extension manager integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tempfile::TempDir;
use uuid::Uuid;

use backoffice_cache::CacheManager;
use backoffice_cache::memory::MemoryCacheProvider;
use backoffice_core::config::cache::MemoryCacheConfig;
use backoffice_core::config::extensions::ExtensionConfig;
use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;
use backoffice_database::ExtensionStore;
use backoffice_entity::extension::{ExtensionRecord, ExtensionSetting, UpsertExtension};
use backoffice_plugin::extension::{
    Activatable, Deactivatable, Extension, ExtensionContext, Initializable, Installable,
    Uninstallable,
};
use backoffice_plugin::hooks::{FnHandler, Registration, names};
use backoffice_plugin::loader::{ExtensionFactory, ExtensionLoader, class_identifier};
use backoffice_plugin::manager::ExtensionManager;

/// Slugs with a compiled-in factory.
///
/// `broken-init` fails its init after registering hooks; `panicky` panics
/// in its activate and init after registering hooks.
pub const KNOWN: [&str; 4] = ["hello-world", "blog", "broken-init", "panicky"];

/// Ordered log shared between the harness and extension instances.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// In-memory [`ExtensionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, ExtensionRecord>>,
    settings: Mutex<BTreeMap<(String, String), Value>>,
    scripts: Mutex<Vec<(String, String)>>,
    fail_writes: AtomicBool,
    fail_once: Mutex<Vec<&'static str>>,
}

impl MemoryStore {
    /// Makes every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the next call to the write named `op` (`"upsert"`,
    /// `"run_setup_script"`, `"seed_setting"`, ...) fail once.
    pub fn fail_once(&self, op: &'static str) {
        self.fail_once.lock().unwrap().push(op);
    }

    /// Number of records.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Setup scripts executed so far as `(slug, sql)`.
    pub fn scripts(&self) -> Vec<(String, String)> {
        self.scripts.lock().unwrap().clone()
    }

    fn check_writable(&self, op: &'static str) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::database("connection lost"));
        }
        let mut once = self.fail_once.lock().unwrap();
        if let Some(i) = once.iter().position(|o| *o == op) {
            once.remove(i);
            return Err(AppError::database(format!("{op} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ExtensionStore for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<ExtensionRecord>> {
        Ok(self.records.lock().unwrap().get(slug).cloned())
    }

    async fn find_all(&self) -> AppResult<Vec<ExtensionRecord>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn active_slugs(&self) -> AppResult<Vec<String>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_active)
            .map(|r| r.slug.clone())
            .collect())
    }

    async fn upsert(&self, data: &UpsertExtension) -> AppResult<ExtensionRecord> {
        self.check_writable("upsert")?;
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(data.slug.clone())
            .and_modify(|r| {
                r.name = data.name.clone();
                r.description = data.description.clone();
                r.version = data.version.clone();
                r.author = data.author.clone();
                r.settings = data.settings.clone();
                r.updated_at = now;
            })
            .or_insert_with(|| ExtensionRecord {
                id: Uuid::new_v4(),
                slug: data.slug.clone(),
                name: data.name.clone(),
                description: data.description.clone(),
                version: data.version.clone(),
                author: data.author.clone(),
                is_active: false,
                settings: data.settings.clone(),
                installed_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn set_active(&self, slug: &str, active: bool) -> AppResult<bool> {
        self.check_writable("set_active")?;
        let mut records = self.records.lock().unwrap();
        match records.get_mut(slug) {
            Some(record) => {
                record.is_active = active;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_inactive(&self, slug: &str) -> AppResult<bool> {
        self.check_writable("delete_inactive")?;
        let mut records = self.records.lock().unwrap();
        if records.get(slug).map(|r| r.is_active) != Some(false) {
            return Ok(false);
        }
        records.remove(slug);
        self.settings
            .lock()
            .unwrap()
            .retain(|(owner, _), _| owner != slug);
        Ok(true)
    }

    async fn run_setup_script(&self, slug: &str, sql: &str) -> AppResult<()> {
        self.check_writable("run_setup_script")?;
        self.scripts
            .lock()
            .unwrap()
            .push((slug.to_string(), sql.to_string()));
        Ok(())
    }

    async fn get_setting(&self, slug: &str, key: &str) -> AppResult<Option<Value>> {
        Ok(self
            .settings
            .lock()
            .unwrap()
            .get(&(slug.to_string(), key.to_string()))
            .cloned())
    }

    async fn list_settings(&self, slug: &str) -> AppResult<Vec<ExtensionSetting>> {
        Ok(self
            .settings
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| owner == slug)
            .map(|((owner, key), value)| ExtensionSetting {
                id: Uuid::new_v4(),
                extension_slug: owner.clone(),
                setting_key: key.clone(),
                setting_value: value.clone(),
            })
            .collect())
    }

    async fn put_setting(&self, slug: &str, key: &str, value: &Value) -> AppResult<()> {
        self.check_writable("put_setting")?;
        self.settings
            .lock()
            .unwrap()
            .insert((slug.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn seed_setting(&self, slug: &str, key: &str, value: &Value) -> AppResult<bool> {
        self.check_writable("seed_setting")?;
        let mut settings = self.settings.lock().unwrap();
        let id = (slug.to_string(), key.to_string());
        if settings.contains_key(&id) {
            return Ok(false);
        }
        settings.insert(id, value.clone());
        Ok(true)
    }

    async fn delete_setting(&self, slug: &str, key: &str) -> AppResult<bool> {
        self.check_writable("delete_setting")?;
        Ok(self
            .settings
            .lock()
            .unwrap()
            .remove(&(slug.to_string(), key.to_string()))
            .is_some())
    }
}

/// Extension that records every capability call as `<slug>:<event>`.
///
/// Its init adds its slug to the admin menu and to the route table.
#[derive(Debug)]
pub struct RecordingExtension {
    slug: String,
    log: EventLog,
}

impl RecordingExtension {
    fn record(&self, event: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{event}", self.slug));
    }
}

impl Extension for RecordingExtension {
    fn initializable(&self) -> Option<&dyn Initializable> {
        Some(self)
    }

    fn activatable(&self) -> Option<&dyn Activatable> {
        Some(self)
    }

    fn deactivatable(&self) -> Option<&dyn Deactivatable> {
        Some(self)
    }

    fn installable(&self) -> Option<&dyn Installable> {
        Some(self)
    }

    fn uninstallable(&self) -> Option<&dyn Uninstallable> {
        Some(self)
    }
}

fn append_slug(slug: String) -> Arc<dyn backoffice_plugin::hooks::HookHandler> {
    FnHandler::arc(move |value| {
        let slug = slug.clone();
        async move {
            let mut items = value.as_array().cloned().unwrap_or_default();
            items.push(Value::String(slug));
            Ok(Value::Array(items))
        }
    })
}

#[async_trait]
impl Initializable for RecordingExtension {
    async fn init(&self, ctx: &ExtensionContext) -> AppResult<()> {
        self.record("init");
        ctx.add(
            names::ADMIN_MENU,
            ctx.method("admin_menu", append_slug(self.slug.clone())),
        )
        .await;
        ctx.add(
            names::REGISTER_ROUTES,
            ctx.method("routes", append_slug(self.slug.clone())),
        )
        .await;

        match self.slug.as_str() {
            "broken-init" => Err(AppError::plugin("init exploded after registering hooks")),
            "panicky" => panic!("init panicked after registering hooks"),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Activatable for RecordingExtension {
    async fn activate(&self, _ctx: &ExtensionContext) -> AppResult<()> {
        self.record("activate");
        if self.slug == "panicky" {
            panic!("activate panicked");
        }
        Ok(())
    }
}

#[async_trait]
impl Deactivatable for RecordingExtension {
    async fn deactivate(&self, _ctx: &ExtensionContext) -> AppResult<()> {
        self.record("deactivate");
        Ok(())
    }
}

#[async_trait]
impl Installable for RecordingExtension {
    async fn install(&self, _ctx: &ExtensionContext) -> AppResult<()> {
        self.record("install");
        Ok(())
    }
}

#[async_trait]
impl Uninstallable for RecordingExtension {
    async fn uninstall(&self, _ctx: &ExtensionContext) -> AppResult<()> {
        self.record("uninstall");
        Ok(())
    }
}

/// A manager wired to an in-memory store, a moka cache, and a temporary
/// extensions directory.
pub struct TestHarness {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub manager: ExtensionManager,
    /// Capability calls made by extension instances.
    pub events: EventLog,
    /// Lifecycle hooks fired, as `<hook>:<payload>`.
    pub lifecycle: EventLog,
}

impl TestHarness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ExtensionConfig {
            directory: dir.path().to_path_buf(),
            entry_extension: "so".to_string(),
            ..ExtensionConfig::default()
        };

        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let mut loader = ExtensionLoader::new(&config);
        for slug in KNOWN {
            loader = loader.with_factory(slug, recording_factory(slug, &events));
        }

        let store = Arc::new(MemoryStore::default());
        let cache = CacheManager::from_provider(Arc::new(MemoryCacheProvider::new(
            &MemoryCacheConfig::default(),
        )));

        let manager = ExtensionManager::new(
            config,
            Arc::new(loader),
            Arc::clone(&store) as Arc<dyn ExtensionStore>,
            cache,
        );

        let lifecycle: EventLog = Arc::new(Mutex::new(Vec::new()));
        for hook in names::LIFECYCLE {
            let log = Arc::clone(&lifecycle);
            manager
                .hooks()
                .add(
                    hook,
                    Registration::function(
                        format!("observe_{hook}"),
                        FnHandler::arc(move |payload| {
                            let log = Arc::clone(&log);
                            async move {
                                let slug = payload.as_str().unwrap_or_default().to_string();
                                log.lock().unwrap().push(format!("{hook}:{slug}"));
                                Ok(payload)
                            }
                        }),
                    ),
                )
                .await;
        }

        Self {
            dir,
            store,
            manager,
            events,
            lifecycle,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a manifest and an entry file for `slug`.
    pub fn add_extension(&self, slug: &str, manifest: Value) {
        self.add_manifest(slug, manifest);
        let dir = self.root().join(slug);
        std::fs::write(dir.join(format!("{}.so", class_identifier(slug))), b"").unwrap();
    }

    /// Writes only the manifest for `slug`, leaving it without code.
    pub fn add_manifest(&self, slug: &str, manifest: Value) {
        let dir = self.root().join(slug);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
    }

    /// Writes `<slug>/db/<name>`.
    pub fn add_script(&self, slug: &str, name: &str, sql: &str) {
        let dir = self.root().join(slug).join("db");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), sql).unwrap();
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn lifecycle(&self) -> Vec<String> {
        self.lifecycle.lock().unwrap().clone()
    }

    /// Current admin menu after every filter ran.
    pub async fn admin_menu(&self) -> Value {
        self.manager
            .dispatcher()
            .dispatch_filter(names::ADMIN_MENU, json!([]))
            .await
    }
}

/// The manifest used by most tests.
pub fn hello_world_manifest() -> Value {
    json!({ "slug": "hello-world", "name": "Hello World", "version": "1.0.0" })
}

fn recording_factory(slug: &str, log: &EventLog) -> ExtensionFactory {
    let slug = slug.to_string();
    let log = Arc::clone(log);
    Arc::new(move || {
        Ok(Arc::new(RecordingExtension {
            slug: slug.clone(),
            log: Arc::clone(&log),
        }) as Arc<dyn Extension>)
    })
}
