// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Step Sweep
//!
//! Walks a working value `M` from just below host `MemTotal` up to it,
//! setting and verifying three derived limits at every step:
//!
//! ```text
//! M0   = MemTotal - base_mem      (or min_mem when MemTotal < base_mem)
//! hard = M - hard_base_mem
//! soft = M - soft_base_mem
//! swap = M
//! M   += hard_base_mem            until M >= MemTotal
//! ```
//!
//! `hard_base_mem` must be positive; configuration validation enforces it.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::verification_service::LimitVerifier;
use crate::domain::error::TestError;
use crate::domain::host::{ApplyScope, DomainHandle, HostMemorySource, MemtuneCommand};
use crate::domain::limit::{ExpectedLimitSet, LimitValue};
use crate::domain::test_config::SweepConfig;

/// One iteration of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStep {
    pub working: LimitValue,
    pub limits: ExpectedLimitSet,
}

/// The sequence of limit triples a sweep applies, independent of any host.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    total: LimitValue,
    start: LimitValue,
    current: LimitValue,
    hard_offset: LimitValue,
    soft_offset: LimitValue,
}

impl SweepPlan {
    pub fn new(total_kib: LimitValue, config: &SweepConfig) -> Self {
        let start = if total_kib >= config.base_mem {
            total_kib - config.base_mem
        } else {
            config.min_mem
        };

        Self {
            total: total_kib,
            start,
            current: start,
            hard_offset: config.hard_base_mem,
            soft_offset: config.soft_base_mem,
        }
    }

    pub fn start(&self) -> LimitValue {
        self.start
    }

    pub fn total(&self) -> LimitValue {
        self.total
    }
}

impl Iterator for SweepPlan {
    type Item = SweepStep;

    fn next(&mut self) -> Option<SweepStep> {
        if self.current >= self.total {
            return None;
        }

        let working = self.current;
        let step = SweepStep {
            working,
            limits: ExpectedLimitSet::new(
                working - self.hard_offset,
                working - self.soft_offset,
                working,
            ),
        };
        // The hard offset doubles as the step size
        self.current += self.hard_offset;
        Some(step)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub total_kib: LimitValue,
    pub start_kib: LimitValue,
    pub iterations: usize,
    pub last_working_kib: Option<LimitValue>,
}

pub struct SweepDriver {
    command: Arc<dyn MemtuneCommand>,
    verifier: Arc<LimitVerifier>,
    host: Arc<dyn HostMemorySource>,
}

impl SweepDriver {
    pub fn new(
        command: Arc<dyn MemtuneCommand>,
        verifier: Arc<LimitVerifier>,
        host: Arc<dyn HostMemorySource>,
    ) -> Self {
        Self {
            command,
            verifier,
            host,
        }
    }

    pub async fn sweep(
        &self,
        config: &SweepConfig,
        resource_path: &Path,
        domain: &dyn DomainHandle,
    ) -> Result<SweepSummary, TestError> {
        let total = self.host.total_kib().await?;
        let plan = SweepPlan::new(total, config);
        let start = plan.start();
        info!(
            "Sweeping memtune limits on {} from {} KiB to MemTotal {} KiB in {} KiB steps",
            domain.name(),
            start,
            total,
            config.hard_base_mem
        );

        let mut iterations = 0;
        let mut last_working = None;

        for step in plan {
            info!(
                "Sweep M={} KiB: hard={} soft={} swap_hard={}",
                step.working,
                step.limits.hard_limit,
                step.limits.soft_limit,
                step.limits.swap_hard_limit
            );

            let outcome = self
                .command
                .set_limits(domain.name(), &step.limits.pairs(), ApplyScope::Live)
                .await?;
            if !outcome.success {
                // Verification below reports what the domain actually holds
                warn!("memtune set failed at M={} KiB: {}", step.working, outcome.message());
            }

            self.verifier
                .verify_all(&step.limits, resource_path, domain)
                .await?;

            iterations += 1;
            last_working = Some(step.working);
        }

        Ok(SweepSummary {
            total_kib: total,
            start_kib: start,
            iterations,
            last_working_kib: last_working,
        })
    }
}
