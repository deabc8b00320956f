//! The extension trait and its optional lifecycle capabilities.
//!
//! An extension implements [`Extension`] and opts into lifecycle events by
//! implementing the matching capability trait and returning `Some(self)`
//! from the accessor. The manager treats a `None` accessor as "nothing to
//! do" rather than an error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use backoffice_core::result::AppResult;

use crate::hooks::{HookHandler, HookRegistry, InstanceId, Registration};

/// Trait implemented by every extension.
pub trait Extension: Send + Sync + fmt::Debug + 'static {
    /// Called once per process when the extension is first booted.
    fn initializable(&self) -> Option<&dyn Initializable> {
        None
    }

    /// Called when the extension is switched on.
    fn activatable(&self) -> Option<&dyn Activatable> {
        None
    }

    /// Called when the extension is switched off.
    fn deactivatable(&self) -> Option<&dyn Deactivatable> {
        None
    }

    /// Called after the extension's record is first created.
    fn installable(&self) -> Option<&dyn Installable> {
        None
    }

    /// Called before the extension's record is removed.
    fn uninstallable(&self) -> Option<&dyn Uninstallable> {
        None
    }
}

/// Registers hooks. Runs at most once per slug per process.
#[async_trait]
pub trait Initializable: Send + Sync {
    /// Registers this extension's callbacks through `ctx`.
    async fn init(&self, ctx: &ExtensionContext) -> AppResult<()>;
}

/// Activation side effects.
#[async_trait]
pub trait Activatable: Send + Sync {
    /// Runs when the extension becomes active.
    async fn activate(&self, ctx: &ExtensionContext) -> AppResult<()>;
}

/// Deactivation side effects.
#[async_trait]
pub trait Deactivatable: Send + Sync {
    /// Runs before the extension is marked inactive.
    async fn deactivate(&self, ctx: &ExtensionContext) -> AppResult<()>;
}

/// Installation side effects beyond setup scripts.
#[async_trait]
pub trait Installable: Send + Sync {
    /// Runs once, after the record and setup scripts.
    async fn install(&self, ctx: &ExtensionContext) -> AppResult<()>;
}

/// Cleanup before removal.
#[async_trait]
pub trait Uninstallable: Send + Sync {
    /// Runs before the record and settings are deleted.
    async fn uninstall(&self, ctx: &ExtensionContext) -> AppResult<()>;
}

/// What an extension sees when one of its capabilities runs.
#[derive(Clone)]
pub struct ExtensionContext {
    slug: String,
    instance: InstanceId,
    hooks: Arc<HookRegistry>,
}

impl ExtensionContext {
    /// Creates a context for the instance `instance` of `slug`.
    pub fn new(slug: impl Into<String>, instance: InstanceId, hooks: Arc<HookRegistry>) -> Self {
        Self {
            slug: slug.into(),
            instance,
            hooks,
        }
    }

    /// Slug of the extension.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Identity of the loaded instance.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// A registration bound to this instance, so deactivation removes it.
    pub fn method(&self, name: impl Into<String>, handler: Arc<dyn HookHandler>) -> Registration {
        Registration::method(self.instance, name, handler)
    }

    /// Adds `registration` under `hook`.
    pub async fn add(&self, hook: &str, registration: Registration) {
        self.hooks.add(hook, registration).await;
    }

    /// The shared hook registry.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }
}

impl fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("slug", &self.slug)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}
