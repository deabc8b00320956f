//! Extension lifecycle and settings commands.

use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use backoffice_core::config::AppConfig;
use backoffice_core::error::AppError;
use backoffice_entity::extension::{ExtensionDescriptor, ExtensionRecord};

use crate::output::{self, OutputFormat};

/// Arguments for extension commands
#[derive(Debug, Args)]
pub struct ExtensionArgs {
    /// Extension subcommand
    #[command(subcommand)]
    pub command: ExtensionCommand,
}

/// Extension subcommands
#[derive(Debug, Subcommand)]
pub enum ExtensionCommand {
    /// List discovered and installed extensions
    List,
    /// Rescan the extensions directory
    Discover,
    /// Install (or refresh) an extension from its manifest
    Install {
        /// Extension slug
        slug: String,
    },
    /// Activate an installed extension
    Activate {
        /// Extension slug
        slug: String,
    },
    /// Deactivate an active extension
    Deactivate {
        /// Extension slug
        slug: String,
    },
    /// Uninstall an inactive extension
    Uninstall {
        /// Extension slug
        slug: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Per-extension settings
    Setting {
        /// Setting subcommand
        #[command(subcommand)]
        command: SettingCommand,
    },
}

/// Setting subcommands
#[derive(Debug, Subcommand)]
pub enum SettingCommand {
    /// Print one setting
    Get {
        /// Extension slug
        slug: String,
        /// Setting key
        key: String,
    },
    /// Write one setting (value parsed as JSON, else stored as a string)
    Set {
        /// Extension slug
        slug: String,
        /// Setting key
        key: String,
        /// Setting value
        value: String,
    },
    /// List every setting of an extension
    List {
        /// Extension slug
        slug: String,
    },
    /// Delete one setting
    Delete {
        /// Extension slug
        slug: String,
        /// Setting key
        key: String,
    },
}

/// Extension display row for table output
#[derive(Debug, Serialize, Tabled)]
struct ExtensionRow {
    /// Slug
    slug: String,
    /// Name
    name: String,
    /// Version
    version: String,
    /// Installed
    installed: bool,
    /// Active
    active: bool,
    /// Manifest present on disk
    on_disk: bool,
}

/// Setting display row for table output
#[derive(Debug, Serialize, Tabled)]
struct SettingRow {
    /// Key
    key: String,
    /// JSON value
    value: String,
}

/// Execute extension commands
pub async fn execute(
    args: &ExtensionArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let manager = super::build_manager(config).await?;

    match &args.command {
        ExtensionCommand::List => {
            let discovered = manager.discover().await?;
            let records = manager.records().await?;
            output::print_list(&merge_rows(&discovered, &records), format);
        }
        ExtensionCommand::Discover => {
            let discovered = manager.rescan().await?;
            output::print_list(&merge_rows(&discovered, &[]), format);
        }
        ExtensionCommand::Install { slug } => {
            let record = manager.install(slug).await?;
            output::print_success(&format!(
                "Extension '{}' {} installed",
                record.slug, record.version
            ));
        }
        ExtensionCommand::Activate { slug } => {
            manager.activate(slug).await?;
            if manager.get(slug).await.is_none() {
                output::print_warning(&format!(
                    "Extension '{slug}' is active but its code could not be loaded"
                ));
            }
            output::print_success(&format!("Extension '{slug}' activated"));
        }
        ExtensionCommand::Deactivate { slug } => {
            manager.deactivate(slug).await?;
            output::print_success(&format!("Extension '{slug}' deactivated"));
        }
        ExtensionCommand::Uninstall { slug, yes } => {
            if !yes {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Uninstall '{slug}' and delete its settings and files?"
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            manager.uninstall(slug).await?;
            output::print_success(&format!("Extension '{slug}' uninstalled"));
        }
        ExtensionCommand::Setting { command } => match command {
            SettingCommand::Get { slug, key } => {
                let value = manager.setting(slug, key).await?.ok_or_else(|| {
                    AppError::not_found(format!("Setting '{key}' of '{slug}' not found"))
                })?;
                output::print_item(&value, format);
            }
            SettingCommand::Set { slug, key, value } => {
                let value = parse_value(value);
                manager.set_setting(slug, key, &value).await?;
                output::print_success(&format!("Setting '{key}' of '{slug}' updated"));
            }
            SettingCommand::List { slug } => {
                let rows: Vec<SettingRow> = manager
                    .settings(slug)
                    .await?
                    .into_iter()
                    .map(|s| SettingRow {
                        key: s.setting_key,
                        value: s.setting_value.to_string(),
                    })
                    .collect();
                output::print_list(&rows, format);
            }
            SettingCommand::Delete { slug, key } => {
                if manager.delete_setting(slug, key).await? {
                    output::print_success(&format!("Setting '{key}' of '{slug}' deleted"));
                } else {
                    output::print_warning(&format!("Setting '{key}' of '{slug}' did not exist"));
                }
            }
        },
    }

    Ok(())
}

/// Join discovered manifests with persisted records, ordered by slug.
fn merge_rows(discovered: &[ExtensionDescriptor], records: &[ExtensionRecord]) -> Vec<ExtensionRow> {
    let mut rows: BTreeMap<String, ExtensionRow> = BTreeMap::new();

    for d in discovered {
        rows.insert(
            d.slug.clone(),
            ExtensionRow {
                slug: d.slug.clone(),
                name: d.name.clone(),
                version: d.version.clone(),
                installed: false,
                active: false,
                on_disk: true,
            },
        );
    }

    for r in records {
        let row = rows.entry(r.slug.clone()).or_insert_with(|| ExtensionRow {
            slug: r.slug.clone(),
            name: r.name.clone(),
            version: r.version.clone(),
            installed: false,
            active: false,
            on_disk: false,
        });
        row.installed = true;
        row.active = r.is_active;
    }

    rows.into_values().collect()
}

/// Interpret `raw` as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
