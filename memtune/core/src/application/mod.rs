// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod verification_service;
pub mod preflight;
pub mod sweep;
pub mod scenario;
pub mod test_run;

pub use verification_service::LimitVerifier;
pub use sweep::{SweepDriver, SweepPlan, SweepSummary};
pub use scenario::{ScenarioDriver, ScenarioOutcome};
pub use test_run::{TestRunService, TestVerdict};
