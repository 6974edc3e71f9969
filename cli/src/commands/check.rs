// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `memtune check`: verify the limits a domain holds right now, without
//! setting anything.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;

use memtune_core::domain::error::TestError;
use memtune_core::domain::limit::ExpectedLimitSet;
use memtune_core::domain::test_config::MemtuneTestManifest;

use super::run::{print_failure, print_report};
use super::RunStatus;
use crate::host::LocalHost;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Domain to check (overrides spec.domain)
    #[arg(long)]
    pub domain: Option<String>,

    /// Expected hard limit in KiB (-1 for unlimited)
    #[arg(long, value_name = "KIB", allow_hyphen_values = true)]
    pub hard_limit: i64,

    /// Expected soft limit in KiB (-1 for unlimited)
    #[arg(long, value_name = "KIB", allow_hyphen_values = true)]
    pub soft_limit: i64,

    /// Expected swap hard limit in KiB (-1 for unlimited)
    #[arg(long, value_name = "KIB", allow_hyphen_values = true)]
    pub swap_hard_limit: i64,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn expected(&self) -> ExpectedLimitSet {
        ExpectedLimitSet::new(self.hard_limit, self.soft_limit, self.swap_hard_limit)
    }
}

pub async fn handle_command(args: CheckArgs, config_path: Option<PathBuf>) -> Result<RunStatus> {
    let mut manifest =
        MemtuneTestManifest::load_or_default(config_path).context("Failed to load configuration")?;
    if let Some(domain) = &args.domain {
        manifest.spec.domain = domain.clone();
    }

    let host = LocalHost::new(&manifest.spec)?;
    let expected = args.expected();

    let result = match host.service().resolve_memory_path(&host.domain).await {
        Ok(path) => host
            .verifier()
            .verify_all(&expected, &path, &host.domain)
            .await
            .map_err(TestError::from),
        Err(e) => Err(e),
    };

    if args.json {
        let value = match &result {
            Ok(report) => json!({
                "passed": true,
                "report": report,
            }),
            Err(e) => {
                let discrepancies = match e {
                    TestError::Verification(inner) => inner.discrepancies().to_vec(),
                    _ => Vec::new(),
                };
                json!({
                    "passed": false,
                    "domain": manifest.spec.domain,
                    "error": e.to_string(),
                    "discrepancies": discrepancies,
                })
            }
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match &result {
            Ok(report) => {
                println!(
                    "{}",
                    format!("✓ Domain {} holds the expected limits", report.domain).green()
                );
                print_report(report);
            }
            Err(e) => print_failure(e),
        }
    }

    Ok(if result.is_ok() {
        RunStatus::Passed
    } else {
        RunStatus::Failed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memtune_core::domain::limit::UNLIMITED;

    #[test]
    fn test_expected_set_from_flags() {
        let args = CheckArgs {
            domain: None,
            hard_limit: 900_000,
            soft_limit: UNLIMITED,
            swap_hard_limit: 1_000_000,
            json: true,
        };
        assert_eq!(
            args.expected(),
            ExpectedLimitSet::new(900_000, UNLIMITED, 1_000_000)
        );
    }
}
