//! # backoffice-database
//!
//! PostgreSQL connection management, migrations, and the persistent
//! extension registry behind the [`ExtensionStore`] trait.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use repositories::extension::ExtensionRepository;
pub use store::ExtensionStore;
