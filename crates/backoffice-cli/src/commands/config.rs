//! Configuration inspection commands.

use clap::{Args, Subcommand};

use backoffice_core::config::{AppConfig, redact_url};
use backoffice_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration, with secrets masked
    Show,
    /// Summarize the sections that matter for extensions
    Validate,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            shown.database.url = redact_url(&shown.database.url);
            output::print_item(&shown, format);
        }
        ConfigCommand::Validate => {
            output::print_success("Configuration loaded");
            output::print_kv("Database", &redact_url(&config.database.url));
            output::print_kv("Cache", &config.cache.provider);
            output::print_kv(
                "Extensions directory",
                &config.extensions.directory.display().to_string(),
            );
            output::print_kv("Manifest file", &config.extensions.manifest_file);
            output::print_kv("Entry extension", &config.extensions.entry_extension);
            if !config.extensions.directory.is_dir() {
                output::print_warning("Extensions directory does not exist yet");
            }
        }
    }

    Ok(())
}
