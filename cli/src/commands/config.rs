// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use memtune_core::domain::test_config::MemtuneTestManifest;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./memtune-config.yaml)
        #[arg(short, long, default_value = "./memtune-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = MemtuneTestManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. MEMTUNE_CONFIG_PATH: {}",
            std::env::var("MEMTUNE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./memtune-config.yaml");
        println!("  4. ~/.memtune/config.yaml");
        println!("  5. /etc/memtune/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Domain: {}", spec.domain);
    println!();

    println!("{}", "virsh:".bold());
    println!("  Binary: {}", spec.virsh.binary);
    println!(
        "  URI: {}",
        spec.virsh.uri.as_deref().unwrap_or("(virsh default)")
    );
    println!("  Timeout: {}s", spec.virsh.timeout_seconds);
    println!("  PID directory: {}", spec.virsh.pid_dir.display());
    println!();

    println!("{}", "Daemon:".bold());
    println!("  Service: {}", spec.daemon.service);
    println!("  systemctl: {}", spec.daemon.systemctl);
    println!("  Restart timeout: {}s", spec.daemon.restart_timeout_seconds);
    println!();

    if spec.sweep.enabled {
        println!("{}", "Sweep (KiB):".bold());
        println!("  base_mem: {}", spec.sweep.base_mem);
        println!("  hard_base_mem: {}", spec.sweep.hard_base_mem);
        println!("  soft_base_mem: {}", spec.sweep.soft_base_mem);
        println!("  min_mem: {}", spec.sweep.min_mem);
    } else {
        let scenario = &spec.scenario;
        let show_limit = |value: Option<i64>| {
            value.map_or_else(|| "(not set)".to_string(), |v| format!("{} KiB", v))
        };
        println!("{}", "Scenario:".bold());
        println!("  hard_limit: {}", show_limit(scenario.hard_limit));
        println!("  soft_limit: {}", show_limit(scenario.soft_limit));
        println!("  swap_hard_limit: {}", show_limit(scenario.swap_hard_limit));
        println!(
            "  Mode: {}",
            if scenario.combined() { "combined" } else { "single" }
        );
        println!("  Restart daemon: {}", scenario.restart_daemon);
        if scenario.expect_error {
            println!(
                "  Expect error: {}",
                scenario.error_pattern.as_deref().unwrap_or("")
            );
        }
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = MemtuneTestManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
