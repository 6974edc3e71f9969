// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Single-Shot Scenario
//!
//! Issues one `memtune` set command and checks the result.
//!
//! | Mode | Command | Expectation |
//! |------|---------|-------------|
//! | single | first configured of hard, soft, swap-hard | value if `> 0`, else unlimited |
//! | combined | all three, one command | values as configured |
//!
//! When a failure is expected, the command must fail with a message matching
//! the configured pattern and nothing is verified. Otherwise the limits are
//! verified, and with `restart_daemon` verified again after the daemon comes
//! back, which proves they were persisted.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use tracing::{info, warn};

use crate::application::verification_service::LimitVerifier;
use crate::domain::error::TestError;
use crate::domain::host::{ApplyScope, CommandOutcome, DaemonController, DomainHandle, MemtuneCommand};
use crate::domain::limit::{LimitKind, LimitValue, UNLIMITED};
use crate::domain::test_config::ScenarioConfig;
use crate::domain::verification::VerificationReport;

#[derive(Debug, Clone)]
pub enum ScenarioOutcome {
    /// The set command failed the way the scenario said it would.
    ExpectedFailure { message: String },
    /// Limits verified, and verified again after a daemon restart if requested.
    Verified {
        report: VerificationReport,
        after_restart: Option<VerificationReport>,
    },
}

/// What to send and what to verify afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub limits: Vec<(LimitKind, LimitValue)>,
    pub expected: Vec<(LimitKind, LimitValue)>,
}

pub fn build_request(config: &ScenarioConfig) -> Result<SetRequest, TestError> {
    if config.combined() {
        let mut limits = Vec::with_capacity(LimitKind::ALL.len());
        for kind in LimitKind::ALL {
            let value = config.limit(kind).ok_or_else(|| {
                TestError::InvalidConfig(format!(
                    "{} is required when all limits are set in one command",
                    kind.query_key()
                ))
            })?;
            limits.push((kind, value));
        }
        return Ok(SetRequest {
            expected: limits.clone(),
            limits,
        });
    }

    let (kind, value) = config.first_configured().ok_or_else(|| {
        TestError::InvalidConfig("no memtune limit configured".to_string())
    })?;
    // Non-positive values remove the limit
    let expected = if value > 0 { value } else { UNLIMITED };

    Ok(SetRequest {
        limits: vec![(kind, value)],
        expected: vec![(kind, expected)],
    })
}

/// Succeeds with the failure message iff the command failed and its stderr
/// or stdout matches `pattern`.
pub fn check_expected_failure(outcome: &CommandOutcome, pattern: &str) -> Result<String, TestError> {
    let regex = Regex::new(pattern).map_err(|source| TestError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    if outcome.success {
        return Err(TestError::UnexpectedSuccess {
            pattern: pattern.to_string(),
        });
    }

    if regex.is_match(&outcome.stderr) || regex.is_match(&outcome.stdout) {
        Ok(outcome.message().to_string())
    } else {
        Err(TestError::ErrorMismatch {
            pattern: pattern.to_string(),
            message: outcome.message().to_string(),
        })
    }
}

pub struct ScenarioDriver {
    command: Arc<dyn MemtuneCommand>,
    verifier: Arc<LimitVerifier>,
    daemon: Arc<dyn DaemonController>,
}

impl ScenarioDriver {
    pub fn new(
        command: Arc<dyn MemtuneCommand>,
        verifier: Arc<LimitVerifier>,
        daemon: Arc<dyn DaemonController>,
    ) -> Self {
        Self {
            command,
            verifier,
            daemon,
        }
    }

    pub async fn run_scenario(
        &self,
        config: &ScenarioConfig,
        resource_path: &Path,
        domain: &dyn DomainHandle,
    ) -> Result<ScenarioOutcome, TestError> {
        let request = build_request(config)?;
        info!(
            "Setting {} on {} ({} mode)",
            request
                .limits
                .iter()
                .map(|(kind, value)| format!("{} {}", kind.option_flag(), value))
                .collect::<Vec<_>>()
                .join(" "),
            domain.name(),
            if config.combined() { "combined" } else { "single" }
        );

        let outcome = self
            .command
            .set_limits(domain.name(), &request.limits, ApplyScope::Live)
            .await?;

        if config.expect_error {
            let pattern = config
                .error_pattern
                .as_deref()
                .ok_or_else(|| TestError::InvalidConfig("error_pattern is required when expect_error is set".to_string()))?;
            let message = check_expected_failure(&outcome, pattern)?;
            info!("memtune failed as expected: {}", message);
            return Ok(ScenarioOutcome::ExpectedFailure { message });
        }

        if !outcome.success {
            warn!("memtune set failed: {}", outcome.message());
        }

        let report = self
            .verifier
            .verify_limits(&request.expected, resource_path, domain)
            .await?;

        let after_restart = if config.restart_daemon {
            info!("Restarting daemon to check that limits persist");
            self.daemon.restart().await?;
            Some(
                self.verifier
                    .verify_limits(&request.expected, resource_path, domain)
                    .await?,
            )
        } else {
            None
        };

        Ok(ScenarioOutcome::Verified {
            report,
            after_restart,
        })
    }
}
