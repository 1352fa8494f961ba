//! Config command - View and validate statsgate configuration
//!
//! Provides the `statsgate config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON), API key redacted
//! 2. Validates the configuration file and reports errors

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use statsgate_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

const REDACTED: &str = "********";

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

/// Show the configuration after environment overrides
fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let mut config = Config::load_or_default(config_path);
    config.apply_env_overrides();
    let config = redacted(config);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;

        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

/// Validate the configuration file
fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    // Load the file explicitly; a missing or broken file is worth reporting
    let mut config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {}", e)
            } else {
                "Configuration file not found. Using defaults.".to_string()
            };
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };
    config.apply_env_overrides();

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();
    let missing_key = config.api.api_key.is_none();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
            "api_key_configured": !missing_key,
        }));
        return Ok(());
    }

    if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    if missing_key {
        formatter.warn("No API key configured; set api.api_key or STATSGATE_API_KEY");
    }

    Ok(())
}

/// Replace the API key so it never reaches the terminal.
fn redacted(mut config: Config) -> Config {
    if config.api.api_key.is_some() {
        config.api.api_key = Some(REDACTED.to_string());
    }
    config
}
