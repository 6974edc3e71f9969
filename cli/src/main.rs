// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # memtune CLI
//!
//! The `memtune` binary sets memory limits on a libvirt domain and checks
//! that virsh, the memory cgroup and the persisted domain XML agree.
//!
//! ## Commands
//!
//! - `memtune run` - Full test: step sweep or single scenario
//! - `memtune check` - Verify the limits a domain currently holds
//! - `memtune config show|validate|generate` - Configuration management
//!
//! Exit codes: 0 passed, 1 failed, 2 not applicable on this host.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use memtune_cli::commands::{self, CheckArgs, ConfigCommand, RunArgs, RunStatus};

/// memtune - libvirt memory limit consistency tests
#[derive(Parser)]
#[command(name = "memtune")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "MEMTUNE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MEMTUNE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Set limits and verify them
    #[command(name = "run")]
    Run(RunArgs),

    /// Verify current limits without setting them
    #[command(name = "check")]
    Check(CheckArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    let status = match cli.command {
        Some(Commands::Run(args)) => commands::run::handle_command(args, cli.config).await?,
        Some(Commands::Check(args)) => commands::check::handle_command(args, cli.config).await?,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await?;
            RunStatus::Passed
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            RunStatus::Failed
        }
    };

    std::process::exit(status.code());
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    // Logs go to stderr so `check --json` output stays parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
