// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tolerant comparison of an observed limit against the requested one.

use crate::domain::limit::LimitValue;

/// Slack allowed between a requested limit and what a channel reports, in KiB.
pub const DEFAULT_TOLERANCE_KIB: i64 = 8;

/// Returns true iff `expected - actual <= tolerance`.
///
/// The check is one-sided: the kernel may round a limit down to page
/// granularity, so an observed value up to `tolerance` below the request is
/// accepted, while any value at or above the request always passes.
pub fn compare(expected: LimitValue, actual: LimitValue, tolerance: i64) -> bool {
    // i128 so a runtime query reporting i64::MAX for "unlimited" cannot overflow
    (expected as i128) - (actual as i128) <= tolerance as i128
}
