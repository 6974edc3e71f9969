// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Limit Verification Service
//!
//! Checks requested memtune limits against every place libvirt and the
//! kernel expose them. For each limit kind, in order:
//!
//! 1. `virsh memtune` runtime value (tolerant comparison)
//! 2. `memory.<suffix>` in the domain's memory cgroup, bytes → KiB (tolerant)
//! 3. `<memtune>` in a freshly fetched domain XML (exact; aborts on mismatch)
//! 4. domain liveness
//!
//! Steps 2 and 3 are skipped for the unlimited sentinel, whose cgroup and XML
//! representations are not comparable to `-1`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::domain::comparator::{compare, DEFAULT_TOLERANCE_KIB};
use crate::domain::host::{DomainConfigSource, DomainHandle, MemtuneCommand};
use crate::domain::limit::{is_unlimited, ExpectedLimitSet, LimitKind, LimitValue};
use crate::domain::verification::{
    Channel, CheckedLimit, Discrepancy, LimitCheck, PersistedMismatch, VerificationError,
    VerificationReport,
};

pub struct LimitVerifier {
    command: Arc<dyn MemtuneCommand>,
    documents: Arc<dyn DomainConfigSource>,
    tolerance: i64,
}

impl LimitVerifier {
    pub fn new(command: Arc<dyn MemtuneCommand>, documents: Arc<dyn DomainConfigSource>) -> Self {
        Self {
            command,
            documents,
            tolerance: DEFAULT_TOLERANCE_KIB,
        }
    }

    /// Check one limit kind on all channels.
    ///
    /// Runtime and cgroup mismatches and a dead domain are returned as
    /// discrepancies. A persisted-XML mismatch ends the check immediately.
    /// Collaborator failures are returned as errors.
    pub async fn verify(
        &self,
        kind: LimitKind,
        expected: LimitValue,
        resource_path: &Path,
        domain: &dyn DomainHandle,
    ) -> Result<LimitCheck, VerificationError> {
        let mut discrepancies = Vec::new();
        let name = domain.name();

        let runtime = self.command.get_limit(name, kind).await?;
        debug!(%kind, expected, runtime, "runtime query");
        if !compare(expected, runtime, self.tolerance) {
            error!(
                "{} virsh output: expected {} KiB, actual {} KiB",
                kind.query_key(),
                expected,
                runtime
            );
            discrepancies.push(Discrepancy::mismatch(kind, Channel::RuntimeQuery, expected, runtime));
        }

        if !is_unlimited(expected) {
            let file = resource_path.join(kind.cgroup_file_name());
            match read_cgroup_kib(&file).await {
                Ok(actual) => {
                    debug!(%kind, expected, actual, path = %file.display(), "cgroup reading");
                    if !compare(expected, actual, self.tolerance) {
                        error!(
                            "{} cgroup fs: expected {} KiB, actual {} KiB",
                            kind.query_key(),
                            expected,
                            actual
                        );
                        discrepancies.push(Discrepancy::mismatch(kind, Channel::CgroupFs, expected, actual));
                    }
                }
                Err(reason) => {
                    error!("Error while reading {}: {}", file.display(), reason);
                    discrepancies.push(Discrepancy::unreadable(
                        kind,
                        Channel::CgroupFs,
                        expected,
                        format!("{}: {}", file.display(), reason),
                    ));
                }
            }

            // Fetched per call so the check sees the current definition
            let document = self.documents.fetch(name).await?;
            debug!(?document, "memtune XML");
            let persisted = document.get(kind);
            if persisted != Some(expected) {
                error!(
                    "{} persisted XML: expected {} KiB, actual {:?}",
                    kind.query_key(),
                    expected,
                    persisted
                );
                return Ok(LimitCheck::PersistedMismatch(PersistedMismatch {
                    kind,
                    expected,
                    actual: persisted,
                }));
            }
        }

        if !domain.is_alive().await? {
            error!("Domain {} is not alive", name);
            discrepancies.push(Discrepancy::not_running(kind, expected));
        }

        Ok(LimitCheck::Checked(discrepancies))
    }

    /// Verify every kind of `expected` in hard, soft, swap-hard order.
    pub async fn verify_all(
        &self,
        expected: &ExpectedLimitSet,
        resource_path: &Path,
        domain: &dyn DomainHandle,
    ) -> Result<VerificationReport, VerificationError> {
        self.verify_limits(&expected.pairs(), resource_path, domain).await
    }

    /// Verify an ordered list of limits, collecting discrepancies across all
    /// of them. A persisted-XML mismatch aborts without checking later kinds.
    pub async fn verify_limits(
        &self,
        limits: &[(LimitKind, LimitValue)],
        resource_path: &Path,
        domain: &dyn DomainHandle,
    ) -> Result<VerificationReport, VerificationError> {
        let mut collected = Vec::new();

        for &(kind, expected) in limits {
            match self.verify(kind, expected, resource_path, domain).await? {
                LimitCheck::Checked(mut discrepancies) => collected.append(&mut discrepancies),
                LimitCheck::PersistedMismatch(mismatch) => {
                    return Err(VerificationError::PersistedMismatch {
                        domain: domain.name().to_string(),
                        kind: mismatch.kind,
                        expected: mismatch.expected,
                        actual: mismatch.actual,
                    });
                }
            }
        }

        if !collected.is_empty() {
            return Err(VerificationError::Discrepancies {
                domain: domain.name().to_string(),
                discrepancies: collected,
            });
        }

        info!("Domain {}: {} memtune limit(s) consistent", domain.name(), limits.len());
        Ok(VerificationReport {
            domain: domain.name().to_string(),
            checked: limits
                .iter()
                .map(|&(kind, expected)| CheckedLimit { kind, expected })
                .collect(),
            checked_at: Utc::now(),
        })
    }
}

/// Read a cgroup byte count and convert it to KiB. The handle is closed
/// when this returns, on success and on every error.
async fn read_cgroup_kib(path: &Path) -> Result<LimitValue, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| e.to_string())?;
    let bytes: u64 = content
        .trim()
        .parse()
        .map_err(|_| format!("not a byte count: '{}'", content.trim()))?;
    Ok((bytes / 1024) as LimitValue)
}
