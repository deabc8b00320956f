//! CLI command definitions and dispatch.

pub mod config;
pub mod extension;
pub mod migrate;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use backoffice_cache::CacheManager;
use backoffice_core::config::AppConfig;
use backoffice_core::error::AppError;
use backoffice_database::{DatabasePool, ExtensionRepository};
use backoffice_plugin::{ExtensionLoader, ExtensionManager};

use crate::output::OutputFormat;

/// Backoffice: administrative backend with an extension system
#[derive(Debug, Parser)]
#[command(name = "backoffice", version, about, long_about = None)]
pub struct Cli {
    /// Path to the base configuration file
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Environment overlay (`config/<env>.toml`)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Extension lifecycle and settings
    Extension(extension::ExtensionArgs),
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    /// Load configuration from the selected files and environment
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load(&self.config, &self.env)
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::Extension(args) => extension::execute(args, config, self.format).await,
            Commands::Config(args) => config::execute(args, config, self.format),
        }
    }
}

/// Helper: connect to the database
pub async fn create_db_pool(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: wire an extension manager to the configured database and cache
///
/// Compiled-in extensions are registered with the loader here.
pub async fn build_manager(config: &AppConfig) -> Result<ExtensionManager, AppError> {
    let pool = create_db_pool(config).await?;
    let store = Arc::new(ExtensionRepository::new(pool.into_pool()));
    let cache = CacheManager::new(&config.cache).await?;

    let loader = ExtensionLoader::new(&config.extensions)
        .with_factory(extension_hello_world::SLUG, extension_hello_world::factory());

    let manager = ExtensionManager::new(config.extensions.clone(), Arc::new(loader), store, cache);

    if config.extensions.boot_on_start {
        manager.boot().await?;
    }

    Ok(manager)
}
