//! Cache key builders for extension registry entries.
//!
//! Centralising key construction keeps the invalidation contract in one
//! place: every key the extension manager memoizes is built here.

/// Namespace shared by every extension cache key.
const PREFIX: &str = "extensions";

/// Slugs of all active extensions.
pub fn active_slugs() -> String {
    format!("{PREFIX}:active")
}

/// Descriptors produced by the last manifest scan.
pub fn discovered() -> String {
    format!("{PREFIX}:discovered")
}

/// Descriptor of a single extension.
pub fn descriptor(slug: &str) -> String {
    format!("{PREFIX}:descriptor:{slug}")
}

/// Persisted record of a single extension.
pub fn record(slug: &str) -> String {
    format!("{PREFIX}:record:{slug}")
}

/// A value computed from the active set (menus, route tables, ...).
pub fn derived(name: &str) -> String {
    format!("{PREFIX}:derived:{name}")
}

/// Pattern matching every [`derived`] key.
pub fn derived_pattern() -> String {
    format!("{PREFIX}:derived:*")
}
