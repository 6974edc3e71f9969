// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resolves a process's cgroup v1 controller directory from procfs.
//!
//! `/proc/<pid>/cgroup` gives the path relative to the controller hierarchy
//! (`4:memory:/machine.slice/machine-qemu\x2d1\x2dvm1.scope`) and
//! `/proc/mounts` gives where that hierarchy is mounted
//! (`cgroup /sys/fs/cgroup/memory cgroup rw,nosuid,memory 0 0`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::host::{CgroupResolver, HostError};

pub struct ProcCgroupResolver {
    proc_root: PathBuf,
}

impl ProcCgroupResolver {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }
}

impl Default for ProcCgroupResolver {
    fn default() -> Self {
        Self::new()
    }
}

async fn read(path: &Path) -> Result<String, HostError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl CgroupResolver for ProcCgroupResolver {
    async fn resolve(&self, pid: u32, controller: &str) -> Result<PathBuf, HostError> {
        let cgroup_file = self.proc_root.join(pid.to_string()).join("cgroup");
        let membership = read(&cgroup_file).await?;
        let relative = controller_path(&membership, controller).ok_or_else(|| {
            HostError::NotFound(format!(
                "{} controller in {}",
                controller,
                cgroup_file.display()
            ))
        })?;

        let mounts = read(&self.proc_root.join("mounts")).await?;
        let mount = controller_mount(&mounts, controller).ok_or_else(|| {
            HostError::NotFound(format!("cgroup v1 mount for the {} controller", controller))
        })?;

        Ok(mount.join(relative.trim_start_matches('/')))
    }
}

/// Path of `controller` in a `/proc/<pid>/cgroup` listing.
pub fn controller_path<'a>(membership: &'a str, controller: &str) -> Option<&'a str> {
    membership.lines().find_map(|line| {
        let mut fields = line.splitn(3, ':');
        let _id = fields.next()?;
        let controllers = fields.next()?;
        let path = fields.next()?;
        controllers
            .split(',')
            .any(|c| c == controller)
            .then_some(path)
    })
}

/// Mount point of the cgroup v1 hierarchy carrying `controller`.
pub fn controller_mount(mounts: &str, controller: &str) -> Option<PathBuf> {
    mounts.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[2] != "cgroup" {
            return None;
        }
        fields[3]
            .split(',')
            .any(|opt| opt == controller)
            .then(|| PathBuf::from(fields[1]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CGROUP: &str = "\
12:hugetlb:/
11:cpu,cpuacct:/machine.slice/machine-qemu\\x2d1\\x2dvm1.scope
4:memory:/machine.slice/machine-qemu\\x2d1\\x2dvm1.scope
1:name=systemd:/machine.slice/machine-qemu\\x2d1\\x2dvm1.scope
";

    const MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
cgroup /sys/fs/cgroup/cpu,cpuacct cgroup rw,nosuid,nodev,noexec,relatime,cpu,cpuacct 0 0
cgroup /sys/fs/cgroup/memory cgroup rw,nosuid,nodev,noexec,relatime,memory 0 0
";

    #[test]
    fn test_controller_path() {
        assert_eq!(
            controller_path(CGROUP, "memory"),
            Some("/machine.slice/machine-qemu\\x2d1\\x2dvm1.scope")
        );
        assert_eq!(controller_path(CGROUP, "blkio"), None);
    }

    #[test]
    fn test_controller_path_in_joint_hierarchy() {
        let membership = "6:memory,blkio:/user.slice\n";
        assert_eq!(controller_path(membership, "memory"), Some("/user.slice"));
    }

    #[test]
    fn test_unified_hierarchy_has_no_memory_controller_line() {
        assert_eq!(controller_path("0::/user.slice\n", "memory"), None);
    }

    #[test]
    fn test_controller_mount() {
        assert_eq!(
            controller_mount(MOUNTS, "memory"),
            Some(PathBuf::from("/sys/fs/cgroup/memory"))
        );
        assert_eq!(
            controller_mount(MOUNTS, "cpu"),
            Some(PathBuf::from("/sys/fs/cgroup/cpu,cpuacct"))
        );
        assert_eq!(controller_mount(MOUNTS, "pids"), None);
    }

    #[tokio::test]
    async fn test_resolve_from_proc_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("4242")).unwrap();
        std::fs::write(root.path().join("4242").join("cgroup"), CGROUP).unwrap();
        std::fs::write(root.path().join("mounts"), MOUNTS).unwrap();

        let resolver = ProcCgroupResolver::with_proc_root(root.path());
        let path = resolver.resolve(4242, "memory").await.unwrap();
        assert_eq!(
            path,
            PathBuf::from("/sys/fs/cgroup/memory/machine.slice/machine-qemu\\x2d1\\x2dvm1.scope")
        );

        let err = resolver.resolve(1, "memory").await.unwrap_err();
        assert!(matches!(err, HostError::Io { .. }));
    }
}
