// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! External process execution with a hard timeout.

use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use crate::domain::host::{CommandOutcome, HostError};

/// Render a command line for logs and error messages.
pub fn describe(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program` to completion, capturing stdout and stderr. A non-zero exit
/// is returned as an unsuccessful [`CommandOutcome`], not as an error; only
/// spawn failures and timeouts are errors.
pub async fn run_command(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutcome, HostError> {
    let rendered = describe(program, args);
    debug!("Running: {}", rendered);

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| HostError::Timeout {
            command: rendered.clone(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|source| HostError::Spawn {
            command: rendered.clone(),
            source,
        })?;

    let outcome = CommandOutcome {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(
        "'{}' exited with {:?}: {}",
        rendered,
        outcome.exit_code,
        outcome.message()
    );
    Ok(outcome)
}

/// Like [`run_command`], but a non-zero exit becomes [`HostError::CommandFailed`].
pub async fn run_checked(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<String, HostError> {
    let outcome = run_command(program, args, timeout).await?;
    if outcome.success {
        Ok(outcome.stdout)
    } else {
        Err(HostError::CommandFailed {
            command: describe(program, args),
            status: outcome.exit_code.unwrap_or(-1),
            stderr: outcome.message().to_string(),
        })
    }
}
