// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `memtune run`: the full test, either a sweep or a single scenario.
//!
//! Flags override the loaded manifest. Passing any limit flag replaces all
//! three scenario limits from the manifest, so a file-configured hard limit
//! never shadows a soft limit given on the command line.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use memtune_core::application::{ScenarioOutcome, TestVerdict};
use memtune_core::domain::error::TestError;
use memtune_core::domain::test_config::MemtuneTestManifest;
use memtune_core::domain::verification::{Discrepancy, VerificationReport};

use super::RunStatus;
use crate::host::LocalHost;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Domain under test (overrides spec.domain)
    #[arg(long)]
    pub domain: Option<String>,

    /// Run the step sweep instead of the scenario
    #[arg(long)]
    pub sweep: bool,

    /// Hard limit in KiB (non-positive removes the limit)
    #[arg(long, value_name = "KIB", allow_hyphen_values = true)]
    pub hard_limit: Option<i64>,

    /// Soft limit in KiB (non-positive removes the limit)
    #[arg(long, value_name = "KIB", allow_hyphen_values = true)]
    pub soft_limit: Option<i64>,

    /// Swap hard limit in KiB (non-positive removes the limit)
    #[arg(long, value_name = "KIB", allow_hyphen_values = true)]
    pub swap_hard_limit: Option<i64>,

    /// Set all three limits in one memtune command
    #[arg(long)]
    pub one_command: bool,

    /// Restart libvirtd and verify again (implies --one-command)
    #[arg(long)]
    pub restart_daemon: bool,

    /// Expect memtune to fail with a message matching PATTERN
    #[arg(long, value_name = "PATTERN")]
    pub expect_error: Option<String>,
}

impl RunArgs {
    pub fn apply(&self, manifest: &mut MemtuneTestManifest) {
        let spec = &mut manifest.spec;

        if let Some(domain) = &self.domain {
            spec.domain = domain.clone();
        }
        if self.sweep {
            spec.sweep.enabled = true;
        }

        let scenario = &mut spec.scenario;
        if self.hard_limit.is_some() || self.soft_limit.is_some() || self.swap_hard_limit.is_some() {
            scenario.hard_limit = self.hard_limit;
            scenario.soft_limit = self.soft_limit;
            scenario.swap_hard_limit = self.swap_hard_limit;
        }
        if self.one_command {
            scenario.set_in_one_command = true;
        }
        if self.restart_daemon {
            scenario.restart_daemon = true;
        }
        if let Some(pattern) = &self.expect_error {
            scenario.expect_error = true;
            scenario.error_pattern = Some(pattern.clone());
        }
    }
}

pub async fn handle_command(args: RunArgs, config_path: Option<PathBuf>) -> Result<RunStatus> {
    let mut manifest =
        MemtuneTestManifest::load_or_default(config_path).context("Failed to load configuration")?;
    args.apply(&mut manifest);
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let host = LocalHost::new(&manifest.spec)?;

    println!(
        "{} {} on {}",
        "Running".bold(),
        manifest.metadata.name,
        manifest.spec.domain.cyan()
    );

    match host.service().execute(&manifest.spec, &host.domain).await {
        Ok(verdict) => {
            print_verdict(&verdict);
            Ok(RunStatus::Passed)
        }
        Err(e) if e.is_not_applicable() => {
            println!("{}", format!("⊘ Not applicable: {}", e).yellow());
            Ok(RunStatus::NotApplicable)
        }
        Err(e) => {
            print_failure(&e);
            Ok(RunStatus::Failed)
        }
    }
}

fn print_verdict(verdict: &TestVerdict) {
    match verdict {
        TestVerdict::Swept(summary) => {
            println!(
                "{}",
                format!(
                    "✓ Sweep passed: {} iteration(s) from {} KiB to MemTotal {} KiB",
                    summary.iterations, summary.start_kib, summary.total_kib
                )
                .green()
            );
        }
        TestVerdict::Scenario(ScenarioOutcome::ExpectedFailure { message }) => {
            println!("{}", "✓ memtune failed as expected".green());
            println!("  {}", message.dimmed());
        }
        TestVerdict::Scenario(ScenarioOutcome::Verified {
            report,
            after_restart,
        }) => {
            println!("{}", "✓ Limits consistent".green());
            print_report(report);
            if let Some(again) = after_restart {
                println!("{}", "✓ Limits still consistent after daemon restart".green());
                print_report(again);
            }
        }
    }
}

pub(crate) fn print_report(report: &VerificationReport) {
    for checked in &report.checked {
        println!("  {:<16} {} KiB", checked.kind.to_string(), checked.expected);
    }
}

pub(crate) fn print_failure(error: &TestError) {
    let discrepancies: &[Discrepancy] = match error {
        TestError::Verification(inner) => inner.discrepancies(),
        _ => &[],
    };

    if discrepancies.is_empty() {
        println!("{}", format!("✗ {}", error).red());
        return;
    }

    println!(
        "{}",
        format!("✗ {} memtune discrepancies", discrepancies.len()).red()
    );
    for discrepancy in discrepancies {
        println!("  - {}", discrepancy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_flags_replace_manifest_limits() {
        let mut manifest = MemtuneTestManifest::default();
        manifest.spec.scenario.hard_limit = Some(1_000);

        let args = RunArgs {
            soft_limit: Some(2_000),
            ..Default::default()
        };
        args.apply(&mut manifest);

        let scenario = &manifest.spec.scenario;
        assert_eq!(scenario.hard_limit, None);
        assert_eq!(scenario.soft_limit, Some(2_000));
        assert_eq!(scenario.swap_hard_limit, None);
    }

    #[test]
    fn test_no_limit_flags_keep_manifest_limits() {
        let mut manifest = MemtuneTestManifest::default();
        manifest.spec.scenario.hard_limit = Some(1_000);

        RunArgs {
            domain: Some("guest2".to_string()),
            ..Default::default()
        }
        .apply(&mut manifest);

        assert_eq!(manifest.spec.domain, "guest2");
        assert_eq!(manifest.spec.scenario.hard_limit, Some(1_000));
    }

    #[test]
    fn test_expect_error_sets_pattern() {
        let mut manifest = MemtuneTestManifest::default();
        RunArgs {
            hard_limit: Some(-1),
            expect_error: Some("exceeds".to_string()),
            restart_daemon: true,
            ..Default::default()
        }
        .apply(&mut manifest);

        let scenario = &manifest.spec.scenario;
        assert!(scenario.expect_error);
        assert!(scenario.restart_daemon);
        assert_eq!(scenario.error_pattern.as_deref(), Some("exceeds"));
        assert_eq!(scenario.hard_limit, Some(-1));
    }

    #[test]
    fn test_sweep_flag_enables_sweep() {
        let mut manifest = MemtuneTestManifest::default();
        RunArgs {
            sweep: true,
            ..Default::default()
        }
        .apply(&mut manifest);
        assert!(manifest.spec.sweep.enabled);
        assert!(manifest.validate().is_ok());
    }
}
