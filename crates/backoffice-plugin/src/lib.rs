//! # backoffice-plugin
//!
//! Extension framework for Backoffice. Provides:
//!
//! - Manifest discovery under the extensions directory
//! - Lazy, cached loading of extension instances from a factory table
//!   (or shared libraries with the `dynamic` feature)
//! - Hook registry with priority ordering, conditions, and identity-based
//!   removal
//! - Action and filter dispatch that isolates failing callbacks
//! - The install / activate / deactivate / uninstall state machine with
//!   cache invalidation on every mutation

pub mod discovery;
pub mod extension;
pub mod hooks;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod prelude;

pub use discovery::ManifestScanner;
pub use extension::{Extension, ExtensionContext};
pub use hooks::{DispatchReport, HookDispatcher, HookRegistry, Registration};
pub use loader::{ExtensionFactory, ExtensionLoader, LoadedExtension, class_identifier};
pub use manager::ExtensionManager;
