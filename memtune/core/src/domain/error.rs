// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Top-level failure taxonomy of a memtune test run.

use thiserror::Error;

use crate::domain::host::HostError;
use crate::domain::verification::VerificationError;

#[derive(Debug, Error)]
pub enum TestError {
    /// The management tool lacks the command or one of its options. The
    /// test does not apply to this host; it has not failed.
    #[error("{feature} is not available in this libvirt version")]
    Unsupported { feature: String },

    #[error("Domain {0} is not running")]
    DomainNotRunning(String),

    #[error("Invalid test configuration: {0}")]
    InvalidConfig(String),

    #[error("Expected memtune to fail matching '{pattern}', but it succeeded")]
    UnexpectedSuccess { pattern: String },

    #[error("memtune failed with '{message}', which does not match '{pattern}'")]
    ErrorMismatch { pattern: String, message: String },

    #[error("Invalid error pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl TestError {
    /// "Not applicable" rather than "failed".
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
