// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory libvirt host shared by the integration tests.
//!
//! `FakeLibvirt` keeps one value per limit for each channel. A successful set
//! command writes the runtime value, the `<memtune>` document and the cgroup
//! file in a temporary directory, the way a healthy libvirt would; tests then
//! corrupt individual channels to provoke discrepancies.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use memtune_core::domain::host::{
    ApplyScope, CgroupResolver, CommandOutcome, DaemonController, DomainConfigSource,
    DomainHandle, HostError, HostMemorySource, MemtuneCommand, MemtuneDocument,
};
use memtune_core::domain::limit::{LimitKind, LimitValue, UNLIMITED};

/// What the kernel reports for "no limit" in cgroup v1.
pub const CGROUP_UNLIMITED_BYTES: u64 = 9_223_372_036_854_771_712;

pub struct FakeLibvirt {
    pub cgroup: TempDir,
    pub runtime: Mutex<HashMap<LimitKind, LimitValue>>,
    pub document: Mutex<MemtuneDocument>,
    pub alive: Mutex<bool>,
    pub set_calls: Mutex<Vec<(Vec<(LimitKind, LimitValue)>, ApplyScope)>>,
    pub get_calls: Mutex<Vec<LimitKind>>,
    pub fetches: Mutex<usize>,
    /// Returned by `set_limits` instead of applying the values.
    pub set_failure: Mutex<Option<CommandOutcome>>,
    pub memtune_available: bool,
    pub options: Vec<&'static str>,
}

impl FakeLibvirt {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(true, vec!["hard-limit", "soft-limit", "swap-hard-limit"]))
    }

    pub fn with_capabilities(memtune_available: bool, options: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self::build(memtune_available, options))
    }

    fn build(memtune_available: bool, options: Vec<&'static str>) -> Self {
        let fake = Self {
            cgroup: tempfile::tempdir().unwrap(),
            runtime: Mutex::new(HashMap::new()),
            document: Mutex::new(MemtuneDocument::default()),
            alive: Mutex::new(true),
            set_calls: Mutex::new(Vec::new()),
            get_calls: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
            set_failure: Mutex::new(None),
            memtune_available,
            options,
        };
        for kind in LimitKind::ALL {
            fake.apply(kind, UNLIMITED);
        }
        fake
    }

    pub fn cgroup_path(&self) -> &Path {
        self.cgroup.path()
    }

    /// Put every channel into the state a healthy libvirt would after setting
    /// `value` for `kind`.
    pub fn apply(&self, kind: LimitKind, value: LimitValue) {
        let normalized = if value > 0 { value } else { UNLIMITED };
        self.runtime.lock().insert(kind, normalized);
        self.document
            .lock()
            .set(kind, (normalized != UNLIMITED).then_some(normalized));
        let bytes = if normalized == UNLIMITED {
            CGROUP_UNLIMITED_BYTES
        } else {
            normalized as u64 * 1024
        };
        self.write_cgroup(kind, &bytes.to_string());
    }

    pub fn write_cgroup(&self, kind: LimitKind, content: &str) {
        std::fs::write(self.cgroup.path().join(kind.cgroup_file_name()), content).unwrap();
    }

    pub fn remove_cgroup(&self, kind: LimitKind) {
        std::fs::remove_file(self.cgroup.path().join(kind.cgroup_file_name())).unwrap();
    }

    pub fn set_runtime(&self, kind: LimitKind, value: LimitValue) {
        self.runtime.lock().insert(kind, value);
    }

    pub fn set_document(&self, kind: LimitKind, value: Option<LimitValue>) {
        self.document.lock().set(kind, value);
    }

    pub fn fail_next_sets(&self, outcome: CommandOutcome) {
        *self.set_failure.lock() = Some(outcome);
    }

    pub fn kill(&self) {
        *self.alive.lock() = false;
    }

    pub fn sets(&self) -> Vec<(Vec<(LimitKind, LimitValue)>, ApplyScope)> {
        self.set_calls.lock().clone()
    }

    pub fn queried_kinds(&self) -> Vec<LimitKind> {
        self.get_calls.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock()
    }
}

#[async_trait]
impl MemtuneCommand for FakeLibvirt {
    async fn get_limit(&self, _domain: &str, kind: LimitKind) -> Result<LimitValue, HostError> {
        self.get_calls.lock().push(kind);
        Ok(*self.runtime.lock().get(&kind).unwrap_or(&UNLIMITED))
    }

    async fn set_limits(
        &self,
        _domain: &str,
        limits: &[(LimitKind, LimitValue)],
        scope: ApplyScope,
    ) -> Result<CommandOutcome, HostError> {
        self.set_calls.lock().push((limits.to_vec(), scope));
        if let Some(failure) = self.set_failure.lock().clone() {
            return Ok(failure);
        }
        for &(kind, value) in limits {
            self.apply(kind, value);
        }
        Ok(CommandOutcome::succeeded(""))
    }

    async fn has_command(&self, _command: &str) -> Result<bool, HostError> {
        Ok(self.memtune_available)
    }

    async fn has_option(&self, _command: &str, option: &str) -> Result<bool, HostError> {
        Ok(self.options.contains(&option))
    }
}

#[async_trait]
impl DomainConfigSource for FakeLibvirt {
    async fn fetch(&self, _domain: &str) -> Result<MemtuneDocument, HostError> {
        *self.fetches.lock() += 1;
        Ok(*self.document.lock())
    }
}

pub struct FakeDomain {
    pub name: String,
    pub host: Arc<FakeLibvirt>,
}

impl FakeDomain {
    pub fn new(host: Arc<FakeLibvirt>) -> Self {
        Self {
            name: "vm1".to_string(),
            host,
        }
    }
}

#[async_trait]
impl DomainHandle for FakeDomain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_alive(&self) -> Result<bool, HostError> {
        Ok(*self.host.alive.lock())
    }

    async fn pid(&self) -> Result<u32, HostError> {
        Ok(4242)
    }
}

/// Resolves every pid to the fake's cgroup directory.
pub struct FakeResolver {
    pub path: PathBuf,
    pub requests: Mutex<Vec<(u32, String)>>,
}

impl FakeResolver {
    pub fn new(host: &FakeLibvirt) -> Arc<Self> {
        Arc::new(Self {
            path: host.cgroup_path().to_path_buf(),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CgroupResolver for FakeResolver {
    async fn resolve(&self, pid: u32, controller: &str) -> Result<PathBuf, HostError> {
        self.requests.lock().push((pid, controller.to_string()));
        Ok(self.path.clone())
    }
}

/// Counts restarts; optionally loses the persisted document like a daemon
/// that never wrote the definition to disk.
pub struct FakeDaemon {
    pub host: Arc<FakeLibvirt>,
    pub restarts: Mutex<usize>,
    pub forget_on_restart: bool,
}

impl FakeDaemon {
    pub fn new(host: Arc<FakeLibvirt>) -> Arc<Self> {
        Arc::new(Self {
            host,
            restarts: Mutex::new(0),
            forget_on_restart: false,
        })
    }

    pub fn forgetful(host: Arc<FakeLibvirt>) -> Arc<Self> {
        Arc::new(Self {
            host,
            restarts: Mutex::new(0),
            forget_on_restart: true,
        })
    }

    pub fn restart_count(&self) -> usize {
        *self.restarts.lock()
    }
}

#[async_trait]
impl DaemonController for FakeDaemon {
    async fn restart(&self) -> Result<(), HostError> {
        *self.restarts.lock() += 1;
        if self.forget_on_restart {
            *self.host.document.lock() = MemtuneDocument::default();
        }
        Ok(())
    }
}

pub struct FixedMemory(pub LimitValue);

#[async_trait]
impl HostMemorySource for FixedMemory {
    async fn total_kib(&self) -> Result<LimitValue, HostError> {
        Ok(self.0)
    }
}
