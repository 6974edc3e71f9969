// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Host Collaborator Contracts
//!
//! Everything the verifiers need from the outside world, expressed as
//! traits. Implementations backed by `virsh`, procfs and systemd live in
//! `crate::infrastructure`; tests substitute in-memory fakes.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | `MemtuneCommand` | get/set memtune limits, query command capabilities |
//! | `DomainConfigSource` | fetch the `<memtune>` section of the live domain XML |
//! | `DomainHandle` | domain name, liveness, qemu process id |
//! | `CgroupResolver` | map a process id to its controller directory |
//! | `DaemonController` | restart the managing daemon |
//! | `HostMemorySource` | host `MemTotal` |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::limit::{LimitKind, LimitValue};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
    #[error("'{command}' exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected output from {what}: {detail}")]
    Parse { what: String, detail: String },
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Which configuration a set command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyScope {
    /// The running domain only (`--live`).
    Live,
    /// The persistent definition only (`--config`).
    Config,
}

impl ApplyScope {
    pub fn flag(self) -> &'static str {
        match self {
            Self::Live => "--live",
            Self::Config => "--config",
        }
    }
}

/// Result of a set command. A failed command is a normal outcome here so
/// that callers expecting an error can inspect the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// The diagnostic text: stderr when present, stdout otherwise.
    pub fn message(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// `<memtune>` values from a freshly fetched domain XML, in KiB.
/// `None` means the element is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemtuneDocument {
    pub hard_limit: Option<LimitValue>,
    pub soft_limit: Option<LimitValue>,
    pub swap_hard_limit: Option<LimitValue>,
}

impl MemtuneDocument {
    pub fn get(&self, kind: LimitKind) -> Option<LimitValue> {
        match kind {
            LimitKind::HardLimit => self.hard_limit,
            LimitKind::SoftLimit => self.soft_limit,
            LimitKind::SwapHardLimit => self.swap_hard_limit,
        }
    }

    pub fn set(&mut self, kind: LimitKind, value: Option<LimitValue>) {
        match kind {
            LimitKind::HardLimit => self.hard_limit = value,
            LimitKind::SoftLimit => self.soft_limit = value,
            LimitKind::SwapHardLimit => self.swap_hard_limit = value,
        }
    }
}

#[async_trait]
pub trait MemtuneCommand: Send + Sync {
    /// Current live value of one limit, `-1` when unlimited.
    async fn get_limit(&self, domain: &str, kind: LimitKind) -> Result<LimitValue, HostError>;

    /// Apply one or more limits in a single command, in the given order.
    async fn set_limits(
        &self,
        domain: &str,
        limits: &[(LimitKind, LimitValue)],
        scope: ApplyScope,
    ) -> Result<CommandOutcome, HostError>;

    /// Whether the management tool knows `command` at all.
    async fn has_command(&self, command: &str) -> Result<bool, HostError>;

    /// Whether the help text of `command` mentions `option`.
    async fn has_option(&self, command: &str, option: &str) -> Result<bool, HostError>;
}

#[async_trait]
pub trait DomainConfigSource: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<MemtuneDocument, HostError>;
}

#[async_trait]
pub trait DomainHandle: Send + Sync {
    fn name(&self) -> &str;
    async fn is_alive(&self) -> Result<bool, HostError>;
    async fn pid(&self) -> Result<u32, HostError>;
}

#[async_trait]
pub trait CgroupResolver: Send + Sync {
    async fn resolve(&self, pid: u32, controller: &str) -> Result<PathBuf, HostError>;
}

#[async_trait]
pub trait DaemonController: Send + Sync {
    /// Restart the daemon and wait until it answers again.
    async fn restart(&self) -> Result<(), HostError>;
}

#[async_trait]
pub trait HostMemorySource: Send + Sync {
    async fn total_kib(&self) -> Result<LimitValue, HostError>;
}
