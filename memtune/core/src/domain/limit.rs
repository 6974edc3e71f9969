// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Memory Limit Kinds and Values
//!
//! libvirt exposes three independently settable memory ceilings per domain.
//! Each kind is observed under a different name on every channel, so the
//! names live on the enum itself rather than in index-aligned tables:
//!
//! | Kind | Runtime / XML key | cgroup file | virsh option |
//! |------|-------------------|-------------|--------------|
//! | `HardLimit` | `hard_limit` | `memory.limit_in_bytes` | `--hard-limit` |
//! | `SoftLimit` | `soft_limit` | `memory.soft_limit_in_bytes` | `--soft-limit` |
//! | `SwapHardLimit` | `swap_hard_limit` | `memory.memsw.limit_in_bytes` | `--swap-hard-limit` |
//!
//! Values are KiB. `-1` means no limit is configured.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A limit quantity in KiB. [`UNLIMITED`] denotes "no limit".
pub type LimitValue = i64;

/// Sentinel for "no limit configured".
pub const UNLIMITED: LimitValue = -1;

pub fn is_unlimited(value: LimitValue) -> bool {
    value == UNLIMITED
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LimitKind {
    HardLimit,
    SoftLimit,
    SwapHardLimit,
}

impl LimitKind {
    /// Processing order for sweeps, combined set commands and verification.
    pub const ALL: [LimitKind; 3] = [
        LimitKind::HardLimit,
        LimitKind::SoftLimit,
        LimitKind::SwapHardLimit,
    ];

    /// Key reported by `virsh memtune <domain>`.
    pub fn query_key(self) -> &'static str {
        match self {
            Self::HardLimit => "hard_limit",
            Self::SoftLimit => "soft_limit",
            Self::SwapHardLimit => "swap_hard_limit",
        }
    }

    /// Suffix of the cgroup v1 memory controller file, after `memory.`.
    pub fn cgroup_suffix(self) -> &'static str {
        match self {
            Self::HardLimit => "limit_in_bytes",
            Self::SoftLimit => "soft_limit_in_bytes",
            Self::SwapHardLimit => "memsw.limit_in_bytes",
        }
    }

    pub fn cgroup_file_name(self) -> String {
        format!("memory.{}", self.cgroup_suffix())
    }

    /// Element name under `<memtune>` in the domain XML.
    pub fn xml_element(self) -> &'static str {
        self.query_key()
    }

    /// Option name as accepted by `virsh memtune` (without leading dashes).
    pub fn option_name(self) -> &'static str {
        match self {
            Self::HardLimit => "hard-limit",
            Self::SoftLimit => "soft-limit",
            Self::SwapHardLimit => "swap-hard-limit",
        }
    }

    pub fn option_flag(self) -> String {
        format!("--{}", self.option_name())
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.option_name())
    }
}

/// One expected value per [`LimitKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedLimitSet {
    pub hard_limit: LimitValue,
    pub soft_limit: LimitValue,
    pub swap_hard_limit: LimitValue,
}

impl ExpectedLimitSet {
    pub fn new(hard_limit: LimitValue, soft_limit: LimitValue, swap_hard_limit: LimitValue) -> Self {
        Self {
            hard_limit,
            soft_limit,
            swap_hard_limit,
        }
    }

    pub fn get(&self, kind: LimitKind) -> LimitValue {
        match kind {
            LimitKind::HardLimit => self.hard_limit,
            LimitKind::SoftLimit => self.soft_limit,
            LimitKind::SwapHardLimit => self.swap_hard_limit,
        }
    }

    /// `(kind, value)` pairs in [`LimitKind::ALL`] order.
    pub fn pairs(&self) -> Vec<(LimitKind, LimitValue)> {
        LimitKind::ALL.iter().map(|&kind| (kind, self.get(kind))).collect()
    }
}
