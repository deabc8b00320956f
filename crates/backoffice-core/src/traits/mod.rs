//! Core traits defined in `backoffice-core` and implemented by other crates.

pub mod cache;

pub use cache::CacheProvider;
