// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Entry point of a memtune test run: capability check, domain checks,
//! cgroup resolution, then either the sweep or the single-shot scenario.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::application::preflight::ensure_memtune_supported;
use crate::application::scenario::{ScenarioDriver, ScenarioOutcome};
use crate::application::sweep::{SweepDriver, SweepSummary};
use crate::application::verification_service::LimitVerifier;
use crate::domain::error::TestError;
use crate::domain::host::{
    CgroupResolver, DaemonController, DomainConfigSource, DomainHandle, HostMemorySource,
    MemtuneCommand,
};
use crate::domain::test_config::MemtuneTestSpec;

pub const MEMORY_CONTROLLER: &str = "memory";

#[derive(Debug, Clone)]
pub enum TestVerdict {
    Swept(SweepSummary),
    Scenario(ScenarioOutcome),
}

pub struct TestRunService {
    command: Arc<dyn MemtuneCommand>,
    resolver: Arc<dyn CgroupResolver>,
    verifier: Arc<LimitVerifier>,
    sweep: SweepDriver,
    scenario: ScenarioDriver,
}

impl TestRunService {
    pub fn new(
        command: Arc<dyn MemtuneCommand>,
        documents: Arc<dyn DomainConfigSource>,
        resolver: Arc<dyn CgroupResolver>,
        daemon: Arc<dyn DaemonController>,
        host: Arc<dyn HostMemorySource>,
    ) -> Self {
        let verifier = Arc::new(LimitVerifier::new(command.clone(), documents));
        Self {
            sweep: SweepDriver::new(command.clone(), verifier.clone(), host),
            scenario: ScenarioDriver::new(command.clone(), verifier.clone(), daemon),
            command,
            resolver,
            verifier,
        }
    }

    pub fn verifier(&self) -> Arc<LimitVerifier> {
        self.verifier.clone()
    }

    /// Memory cgroup directory of the domain's qemu process.
    pub async fn resolve_memory_path(&self, domain: &dyn DomainHandle) -> Result<PathBuf, TestError> {
        if !domain.is_alive().await? {
            return Err(TestError::DomainNotRunning(domain.name().to_string()));
        }
        let pid = domain.pid().await?;
        let path = self.resolver.resolve(pid, MEMORY_CONTROLLER).await?;
        info!("Domain {} (pid {}) memory cgroup: {}", domain.name(), pid, path.display());
        Ok(path)
    }

    pub async fn execute(
        &self,
        spec: &MemtuneTestSpec,
        domain: &dyn DomainHandle,
    ) -> Result<TestVerdict, TestError> {
        ensure_memtune_supported(self.command.as_ref()).await?;

        let path = self.resolve_memory_path(domain).await?;

        if spec.sweep.enabled {
            let summary = self.sweep.sweep(&spec.sweep, &path, domain).await?;
            info!(
                "Sweep finished after {} iteration(s) on {}",
                summary.iterations,
                domain.name()
            );
            return Ok(TestVerdict::Swept(summary));
        }

        let outcome = self.scenario.run_scenario(&spec.scenario, &path, domain).await?;
        Ok(TestVerdict::Scenario(outcome))
    }
}
