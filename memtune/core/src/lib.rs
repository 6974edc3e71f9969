// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # memtune core
//!
//! Verifies that memory limits applied to a libvirt domain agree across the
//! three places they can be observed:
//!
//! | Channel | Source |
//! |---------|--------|
//! | runtime query | `virsh memtune <domain>` |
//! | cgroup fs | `<memory cgroup>/memory.<suffix>` |
//! | persisted config | `<memtune>` in `virsh dumpxml <domain>` |
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** `domain` holds value types and collaborator traits,
//!   `application` the verifiers and test drivers, `infrastructure` the
//!   virsh/procfs/systemd implementations of the collaborator traits.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
