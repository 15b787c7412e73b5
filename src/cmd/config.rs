//! Configuration view and validation commands (`light-rebuild config`).

use anyhow::Result;
use light_rebuild::config::{CONFIG_FILE_NAME, CUSTOM_BRANCH_ENV, Config, LIGHT_BRANCH_ENV};

use super::super::ConfigCommands;

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.repo_dir.join(CONFIG_FILE_NAME);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Light Rebuild Configuration");
            println!("===========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No {} found, using defaults.", CONFIG_FILE_NAME);
            }
            println!();

            let toml = config.toml();
            println!("[branches]");
            println!("  light = \"{}\"", toml.branches.light);
            println!("  custom = \"{}\"", toml.branches.custom);
            println!(
                "  light_backup_prefix = \"{}\"",
                toml.branches.light_backup_prefix
            );
            println!(
                "  custom_backup_prefix = \"{}\"",
                toml.branches.custom_backup_prefix
            );
            println!(
                "  custom_tag_pattern = \"{}\"",
                toml.branches.custom_tag_pattern
            );
            println!();
            println!("[rebuild]");
            println!("  lookback_limit = {}", toml.rebuild.lookback_limit);
            println!("  status_file = \"{}\"", toml.rebuild.status_file);
            println!();

            println!("Effective values (with env overrides):");
            println!(
                "  light branch = \"{}\" ({})",
                config.light_branch, LIGHT_BRANCH_ENV
            );
            println!(
                "  custom branch = \"{}\" ({})",
                config.custom_branch, CUSTOM_BRANCH_ENV
            );
            println!("  status file = {}", config.status_file.display());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE_NAME);
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }

    Ok(())
}
