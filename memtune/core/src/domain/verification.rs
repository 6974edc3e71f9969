// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Verification Results
//!
//! A limit is checked on three channels plus domain liveness. Mismatches on
//! the runtime query or the cgroup filesystem, and a dead domain, are
//! *discrepancies*: they are collected so a single pass reports everything
//! that is wrong. A mismatch in the persisted domain XML is different in
//! kind: the requested state never made it into the definition, so checking
//! stops there.
//!
//! ```text
//! LimitCheck::Checked(vec![])            -> this kind is consistent
//! LimitCheck::Checked(vec![d1, d2])      -> aggregated, keep going
//! LimitCheck::PersistedMismatch(m)       -> abort the whole verification
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::host::HostError;
use crate::domain::limit::{LimitKind, LimitValue};

/// Where a discrepancy was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    RuntimeQuery,
    CgroupFs,
    Liveness,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RuntimeQuery => "runtime-query",
            Self::CgroupFs => "cgroup-fs",
            Self::Liveness => "liveness",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: LimitKind,
    pub channel: Channel,
    pub expected: LimitValue,
    /// Observed value, if one could be read.
    pub actual: Option<LimitValue>,
    /// Set when the channel could not be read at all (`error=io`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_error: Option<String>,
}

impl Discrepancy {
    pub fn mismatch(kind: LimitKind, channel: Channel, expected: LimitValue, actual: LimitValue) -> Self {
        Self {
            kind,
            channel,
            expected,
            actual: Some(actual),
            io_error: None,
        }
    }

    pub fn unreadable(kind: LimitKind, channel: Channel, expected: LimitValue, error: impl Into<String>) -> Self {
        Self {
            kind,
            channel,
            expected,
            actual: None,
            io_error: Some(error.into()),
        }
    }

    pub fn not_running(kind: LimitKind, expected: LimitValue) -> Self {
        Self {
            kind,
            channel: Channel::Liveness,
            expected,
            actual: None,
            io_error: None,
        }
    }

    pub fn is_io_error(&self) -> bool {
        self.io_error.is_some()
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.channel, &self.actual, &self.io_error) {
            (_, _, Some(err)) => write!(f, "{} [{}, error=io]: {}", self.kind, self.channel, err),
            (Channel::Liveness, _, None) => {
                write!(f, "{} [{}]: domain is not running", self.kind, self.channel)
            }
            (_, Some(actual), None) => write!(
                f,
                "{} [{}]: expected {} KiB, got {} KiB",
                self.kind, self.channel, self.expected, actual
            ),
            (_, None, None) => write!(
                f,
                "{} [{}]: expected {} KiB, got nothing",
                self.kind, self.channel, self.expected
            ),
        }
    }
}

/// The persisted domain definition disagrees with the requested limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMismatch {
    pub kind: LimitKind,
    pub expected: LimitValue,
    pub actual: Option<LimitValue>,
}

/// Outcome of checking one limit kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitCheck {
    Checked(Vec<Discrepancy>),
    PersistedMismatch(PersistedMismatch),
}

impl LimitCheck {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Checked(d) if d.is_empty())
    }
}

/// One `(kind, expected)` pair that was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedLimit {
    pub kind: LimitKind,
    pub expected: LimitValue,
}

/// Produced only when every checked limit is consistent on every channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub domain: String,
    pub checked: Vec<CheckedLimit>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Domain {domain}: {} memtune discrepancies: {}", .discrepancies.len(), render(.discrepancies))]
    Discrepancies {
        domain: String,
        discrepancies: Vec<Discrepancy>,
    },
    #[error(
        "Domain {domain}: persisted {kind} is {}, expected {expected} KiB",
        describe(.actual)
    )]
    PersistedMismatch {
        domain: String,
        kind: LimitKind,
        expected: LimitValue,
        actual: Option<LimitValue>,
    },
    #[error(transparent)]
    Host(#[from] HostError),
}

impl VerificationError {
    pub fn discrepancies(&self) -> &[Discrepancy] {
        match self {
            Self::Discrepancies { discrepancies, .. } => discrepancies,
            _ => &[],
        }
    }
}

fn render(discrepancies: &[Discrepancy]) -> String {
    discrepancies
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe(actual: &Option<LimitValue>) -> String {
    match actual {
        Some(value) => format!("{} KiB", value),
        None => "absent".to_string(),
    }
}
