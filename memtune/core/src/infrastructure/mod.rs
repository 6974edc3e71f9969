// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod process;
pub mod virsh;
pub mod cgroup;
pub mod meminfo;
pub mod libvirtd;

pub use cgroup::ProcCgroupResolver;
pub use libvirtd::SystemdDaemonController;
pub use meminfo::ProcMeminfo;
pub use virsh::{VirshClient, VirshDomain};
