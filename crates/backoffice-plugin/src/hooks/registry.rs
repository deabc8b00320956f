//! Hook registry: callbacks registered by hook name with priority ordering.
//!
//! Within one hook name registrations run by ascending priority; equal
//! priorities keep insertion order. The order is fixed at registration
//! time, so repeated dispatches see the same sequence.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::callback::{Callback, CallbackIdentity, HookHandler, InstanceId};

/// Priority used when a registration does not pick one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Predicate evaluated right before a registration runs.
pub type Condition = Arc<dyn Fn() -> bool + Send + Sync>;

/// A callback ready to be added to a hook.
#[derive(Clone)]
pub struct Registration {
    pub(crate) callback: Callback,
    pub(crate) priority: i32,
    pub(crate) condition: Option<Condition>,
}

impl Registration {
    /// A free-standing callback identified by `name`.
    pub fn function(name: impl Into<String>, handler: Arc<dyn HookHandler>) -> Self {
        Self::from_callback(Callback::Function {
            name: name.into(),
            handler,
        })
    }

    /// A method of the extension instance `owner`.
    pub fn method(
        owner: InstanceId,
        method: impl Into<String>,
        handler: Arc<dyn HookHandler>,
    ) -> Self {
        Self::from_callback(Callback::Method {
            owner,
            method: method.into(),
            handler,
        })
    }

    fn from_callback(callback: Callback) -> Self {
        Self {
            callback,
            priority: DEFAULT_PRIORITY,
            condition: None,
        }
    }

    /// Sets the priority (lower runs first).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Skips this registration whenever `condition` returns `false`.
    pub fn when(mut self, condition: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// The registered callback.
    pub fn callback(&self) -> &Callback {
        &self.callback
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("callback", &self.callback)
            .field("priority", &self.priority)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// Registry of hook callbacks organized by hook name.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<String, Vec<Registration>>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration under `hook`.
    pub async fn add(&self, hook: &str, registration: Registration) {
        let identity = registration.callback.identity();
        let priority = registration.priority;

        let mut hooks = self.hooks.write().await;
        let entries = hooks.entry(hook.to_string()).or_default();
        entries.push(registration);
        // Stable sort keeps insertion order among equal priorities.
        entries.sort_by_key(|r| r.priority);

        debug!(hook, callback = %identity, priority, "Hook callback registered");
    }

    /// Removes every registration under `hook` matching `identity`.
    ///
    /// Returns the number of registrations removed.
    pub async fn remove(&self, hook: &str, identity: &CallbackIdentity) -> usize {
        let mut hooks = self.hooks.write().await;
        let Some(entries) = hooks.get_mut(hook) else {
            return 0;
        };

        let before = entries.len();
        entries.retain(|r| !r.callback.matches(identity));
        let removed = before - entries.len();

        if entries.is_empty() {
            hooks.remove(hook);
        }

        debug!(hook, callback = %identity, removed, "Hook callbacks removed");
        removed
    }

    /// Removes every registration owned by `owner`, across all hook names.
    pub async fn remove_owner(&self, owner: InstanceId) -> usize {
        let identity = CallbackIdentity::Owner(owner);
        let mut hooks = self.hooks.write().await;
        let mut removed = 0;

        for entries in hooks.values_mut() {
            let before = entries.len();
            entries.retain(|r| !r.callback.matches(&identity));
            removed += before - entries.len();
        }

        hooks.retain(|_, entries| !entries.is_empty());

        debug!(owner = %owner, removed, "Instance hooks removed");
        removed
    }

    /// Whether anything is registered under `hook`.
    pub async fn has(&self, hook: &str) -> bool {
        let hooks = self.hooks.read().await;
        hooks.get(hook).is_some_and(|entries| !entries.is_empty())
    }

    /// Number of registrations under `hook`.
    pub async fn handler_count(&self, hook: &str) -> usize {
        let hooks = self.hooks.read().await;
        hooks.get(hook).map(Vec::len).unwrap_or(0)
    }

    /// Names of all hooks with at least one registration, sorted.
    pub async fn registered_hooks(&self) -> Vec<String> {
        let hooks = self.hooks.read().await;
        let mut names: Vec<String> = hooks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops every registration.
    pub async fn clear(&self) {
        self.hooks.write().await.clear();
    }

    /// Registrations under `hook` in dispatch order.
    ///
    /// Returned by value so no lock is held while callbacks run.
    pub(crate) async fn snapshot(&self, hook: &str) -> Vec<Registration> {
        let hooks = self.hooks.read().await;
        hooks.get(hook).cloned().unwrap_or_default()
    }
}
