//! Hook callbacks and their identities.
//!
//! A callback is either a free-standing function registered under a name,
//! or a method bound to a loaded extension instance. Removal compares
//! [`CallbackIdentity`] values against callbacks; matching on
//! [`CallbackIdentity::Owner`] is how every hook of a deactivated
//! extension is dropped at once.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use backoffice_core::result::AppResult;

/// Process-unique identity of a loaded extension instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Allocates a fresh identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code invoked when a hook fires.
///
/// Action dispatch ignores the returned value; filter dispatch passes it
/// to the next registration.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Handles one invocation.
    async fn handle(&self, value: Value) -> AppResult<Value>;
}

/// A closure-based hook handler.
pub struct FnHandler {
    f: Arc<dyn Fn(Value) -> BoxFuture<'static, AppResult<Value>> + Send + Sync>,
}

impl FnHandler {
    /// Wraps an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |value: Value| -> BoxFuture<'static, AppResult<Value>> {
                Box::pin(f(value))
            }),
        }
    }

    /// Wraps an async closure and returns it ready for registration.
    pub fn arc<F, Fut>(f: F) -> Arc<dyn HookHandler>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl HookHandler for FnHandler {
    async fn handle(&self, value: Value) -> AppResult<Value> {
        (self.f)(value).await
    }
}

/// A registered piece of code, tagged by how it is identified.
#[derive(Clone)]
pub enum Callback {
    /// A free-standing callback registered under a name.
    Function {
        /// Name used for identity comparison.
        name: String,
        /// The code to run.
        handler: Arc<dyn HookHandler>,
    },
    /// A method bound to a loaded extension instance.
    Method {
        /// The instance the method belongs to.
        owner: InstanceId,
        /// Method name, unique within the owner.
        method: String,
        /// The code to run.
        handler: Arc<dyn HookHandler>,
    },
}

impl Callback {
    /// The code to run.
    pub fn handler(&self) -> &Arc<dyn HookHandler> {
        match self {
            Self::Function { handler, .. } | Self::Method { handler, .. } => handler,
        }
    }

    /// The owning instance, for bound methods.
    pub fn owner(&self) -> Option<InstanceId> {
        match self {
            Self::Function { .. } => None,
            Self::Method { owner, .. } => Some(*owner),
        }
    }

    /// This callback's own identity.
    pub fn identity(&self) -> CallbackIdentity {
        match self {
            Self::Function { name, .. } => CallbackIdentity::Function(name.clone()),
            Self::Method { owner, method, .. } => CallbackIdentity::Method {
                owner: *owner,
                method: method.clone(),
            },
        }
    }

    /// Whether `identity` designates this callback.
    pub fn matches(&self, identity: &CallbackIdentity) -> bool {
        match (self, identity) {
            (Self::Function { name, .. }, CallbackIdentity::Function(wanted)) => name == wanted,
            (
                Self::Method { owner, method, .. },
                CallbackIdentity::Method {
                    owner: wanted_owner,
                    method: wanted_method,
                },
            ) => owner == wanted_owner && method == wanted_method,
            (Self::Method { owner, .. }, CallbackIdentity::Owner(wanted)) => owner == wanted,
            _ => false,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({})", self.identity())
    }
}

/// What a removal request compares callbacks against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackIdentity {
    /// A free function by name.
    Function(String),
    /// One method of one instance.
    Method {
        /// Owning instance.
        owner: InstanceId,
        /// Method name.
        method: String,
    },
    /// Every method of one instance.
    Owner(InstanceId),
}

impl fmt::Display for CallbackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(name) => write!(f, "{name}"),
            Self::Method { owner, method } => write!(f, "{owner}::{method}"),
            Self::Owner(owner) => write!(f, "{owner}::*"),
        }
    }
}
