// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::host::{HostError, HostMemorySource};
use crate::domain::limit::LimitValue;

/// Host memory from `/proc/meminfo`.
pub struct ProcMeminfo {
    path: PathBuf,
}

impl ProcMeminfo {
    pub fn new() -> Self {
        Self::with_path("/proc/meminfo")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMeminfo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostMemorySource for ProcMeminfo {
    async fn total_kib(&self) -> Result<LimitValue, HostError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| HostError::Io {
                path: self.path.clone(),
                source,
            })?;
        meminfo_field(&content, "MemTotal").ok_or_else(|| HostError::Parse {
            what: self.path.display().to_string(),
            detail: "no MemTotal line".to_string(),
        })
    }
}

/// Value of a `Name:   12345 kB` line.
pub fn meminfo_field(content: &str, name: &str) -> Option<LimitValue> {
    content.lines().find_map(|line| {
        let (key, rest) = line.split_once(':')?;
        if key.trim() != name {
            return None;
        }
        rest.split_whitespace().next()?.parse().ok()
    })
}
