//! Prelude for extension crates.

pub use async_trait::async_trait;
pub use serde_json::{Value, json};

pub use backoffice_core::error::AppError;
pub use backoffice_core::result::AppResult;

pub use crate::extension::{
    Activatable, Deactivatable, Extension, ExtensionContext, Initializable, Installable,
    Uninstallable,
};
pub use crate::hooks::names;
pub use crate::hooks::{FnHandler, HookHandler, InstanceId, Registration};
pub use crate::loader::ExtensionFactory;

pub use crate::{declare_extension, method};
