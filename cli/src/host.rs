// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local host wiring
//!
//! Builds the virsh, procfs and systemd collaborators for the domain named in
//! the manifest and hands them to the core services.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use memtune_core::application::{LimitVerifier, TestRunService};
use memtune_core::domain::test_config::{MemtuneTestSpec, VirshConfig};
use memtune_core::infrastructure::{
    ProcCgroupResolver, ProcMeminfo, SystemdDaemonController, VirshClient, VirshDomain,
};

pub struct LocalHost {
    pub domain: VirshDomain,
    service: TestRunService,
}

impl LocalHost {
    pub fn new(spec: &MemtuneTestSpec) -> Result<Self> {
        let binary = resolve_binary(&spec.virsh.binary)?;
        debug!("Using virsh at {}", binary.display());

        let virsh = Arc::new(VirshClient::from_config(&VirshConfig {
            binary: binary.display().to_string(),
            ..spec.virsh.clone()
        }));
        let domain = virsh.domain(spec.domain.clone(), spec.virsh.pid_dir.clone());
        let daemon = Arc::new(SystemdDaemonController::new(&spec.daemon, virsh.clone()));

        let service = TestRunService::new(
            virsh.clone(),
            virsh,
            Arc::new(ProcCgroupResolver::new()),
            daemon,
            Arc::new(ProcMeminfo::new()),
        );

        Ok(Self { domain, service })
    }

    pub fn service(&self) -> &TestRunService {
        &self.service
    }

    pub fn verifier(&self) -> Arc<LimitVerifier> {
        self.service.verifier()
    }
}

/// Absolute path of the virsh executable.
pub fn resolve_binary(binary: &str) -> Result<PathBuf> {
    if Path::new(binary).is_absolute() {
        return Ok(PathBuf::from(binary));
    }
    which::which(binary).with_context(|| format!("'{}' not found in PATH; is libvirt installed?", binary))
}
