// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Single-limit and aggregate verification against an in-memory host.
//!
//! Covers:
//! - clean pass on all channels
//! - tolerance on runtime and cgroup readings (one-sided)
//! - unlimited sentinel skipping cgroup and XML
//! - io errors reported as tagged discrepancies
//! - immediate abort on a persisted XML mismatch
//! - aggregation of everything else before failing

mod common;

use std::sync::Arc;

use common::{FakeDomain, FakeLibvirt};
use memtune_core::application::LimitVerifier;
use memtune_core::domain::limit::{ExpectedLimitSet, LimitKind, UNLIMITED};
use memtune_core::domain::verification::{Channel, LimitCheck, VerificationError};

fn verifier(host: &Arc<FakeLibvirt>) -> LimitVerifier {
    LimitVerifier::new(host.clone(), host.clone())
}

fn applied(set: &ExpectedLimitSet) -> Arc<FakeLibvirt> {
    let host = FakeLibvirt::new();
    for (kind, value) in set.pairs() {
        host.apply(kind, value);
    }
    host
}

#[tokio::test]
async fn test_verify_all_passes_when_every_channel_matches() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    let domain = FakeDomain::new(host.clone());

    let report = verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .unwrap();

    assert_eq!(report.domain, "vm1");
    assert_eq!(report.checked.len(), 3);
    assert_eq!(report.checked[0].kind, LimitKind::HardLimit);
    assert_eq!(report.checked[2].expected, 1_000_000);
    assert_eq!(
        host.queried_kinds(),
        vec![LimitKind::HardLimit, LimitKind::SoftLimit, LimitKind::SwapHardLimit]
    );
}

#[tokio::test]
async fn test_document_is_fetched_for_every_limit() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    let domain = FakeDomain::new(host.clone());

    verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .unwrap();

    assert_eq!(host.fetch_count(), 3);
}

#[tokio::test]
async fn test_readings_within_tolerance_pass() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    // Rounded down by 8 KiB on the runtime query, 4 KiB in the cgroup
    host.set_runtime(LimitKind::HardLimit, 899_992);
    host.write_cgroup(LimitKind::SoftLimit, &((950_000u64 - 4) * 1024).to_string());
    let domain = FakeDomain::new(host.clone());

    assert!(verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_readings_above_expected_always_pass() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    host.set_runtime(LimitKind::SwapHardLimit, 5_000_000);
    host.write_cgroup(LimitKind::HardLimit, &(2_000_000u64 * 1024).to_string());
    let domain = FakeDomain::new(host.clone());

    assert!(verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_runtime_mismatch_beyond_tolerance_is_a_discrepancy() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    host.set_runtime(LimitKind::HardLimit, 899_991);
    let domain = FakeDomain::new(host.clone());

    let check = verifier(&host)
        .verify(LimitKind::HardLimit, 900_000, host.cgroup_path(), &domain)
        .await
        .unwrap();

    match check {
        LimitCheck::Checked(discrepancies) => {
            assert_eq!(discrepancies.len(), 1);
            assert_eq!(discrepancies[0].channel, Channel::RuntimeQuery);
            assert_eq!(discrepancies[0].actual, Some(899_991));
        }
        other => panic!("Expected discrepancies, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unlimited_skips_cgroup_and_document() {
    let host = FakeLibvirt::new();
    // Raw readings that would never equal -1
    host.write_cgroup(LimitKind::SoftLimit, "12345");
    host.set_document(LimitKind::SoftLimit, Some(777));
    let domain = FakeDomain::new(host.clone());

    let check = verifier(&host)
        .verify(LimitKind::SoftLimit, UNLIMITED, host.cgroup_path(), &domain)
        .await
        .unwrap();

    assert!(check.is_clean());
    assert_eq!(host.fetch_count(), 0);
}

#[tokio::test]
async fn test_unlimited_tolerates_missing_cgroup_file() {
    let host = FakeLibvirt::new();
    host.remove_cgroup(LimitKind::SwapHardLimit);
    let domain = FakeDomain::new(host.clone());

    let check = verifier(&host)
        .verify(LimitKind::SwapHardLimit, UNLIMITED, host.cgroup_path(), &domain)
        .await
        .unwrap();

    assert!(check.is_clean());
}

#[tokio::test]
async fn test_unreadable_cgroup_file_is_tagged_io() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    host.remove_cgroup(LimitKind::SwapHardLimit);
    let domain = FakeDomain::new(host.clone());

    let err = verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .unwrap_err();

    let discrepancies = err.discrepancies();
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].kind, LimitKind::SwapHardLimit);
    assert_eq!(discrepancies[0].channel, Channel::CgroupFs);
    assert!(discrepancies[0].is_io_error());
    assert!(discrepancies[0]
        .io_error
        .as_deref()
        .unwrap()
        .contains("memory.memsw.limit_in_bytes"));
}

#[tokio::test]
async fn test_discrepancies_from_all_kinds_are_collected() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    host.set_runtime(LimitKind::HardLimit, 1);
    host.write_cgroup(LimitKind::SwapHardLimit, "1024");
    host.kill();
    let domain = FakeDomain::new(host.clone());

    let err = verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .unwrap_err();

    let discrepancies = err.discrepancies();
    // Runtime mismatch on hard, cgroup mismatch on swap-hard, and a dead
    // domain reported once per kind
    assert_eq!(discrepancies.len(), 5);
    assert_eq!(
        discrepancies
            .iter()
            .filter(|d| d.channel == Channel::Liveness)
            .count(),
        3
    );
    assert!(discrepancies
        .iter()
        .any(|d| d.kind == LimitKind::HardLimit && d.channel == Channel::RuntimeQuery));
    assert!(discrepancies
        .iter()
        .any(|d| d.kind == LimitKind::SwapHardLimit && d.channel == Channel::CgroupFs && d.actual == Some(1)));
}

#[tokio::test]
async fn test_persisted_mismatch_aborts_before_later_kinds() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    host.set_document(LimitKind::SoftLimit, Some(940_000));
    let domain = FakeDomain::new(host.clone());

    let err = verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .unwrap_err();

    match err {
        VerificationError::PersistedMismatch {
            domain,
            kind,
            expected,
            actual,
        } => {
            assert_eq!(domain, "vm1");
            assert_eq!(kind, LimitKind::SoftLimit);
            assert_eq!(expected, 950_000);
            assert_eq!(actual, Some(940_000));
        }
        other => panic!("Expected PersistedMismatch, got {:?}", other),
    }

    // swap-hard-limit was never looked at
    assert_eq!(
        host.queried_kinds(),
        vec![LimitKind::HardLimit, LimitKind::SoftLimit]
    );
    assert_eq!(host.fetch_count(), 2);
}

#[tokio::test]
async fn test_persisted_mismatch_wins_over_earlier_discrepancies() {
    let expected = ExpectedLimitSet::new(900_000, 950_000, 1_000_000);
    let host = applied(&expected);
    host.set_runtime(LimitKind::HardLimit, 1);
    host.set_document(LimitKind::SoftLimit, None);
    let domain = FakeDomain::new(host.clone());

    let err = verifier(&host)
        .verify_all(&expected, host.cgroup_path(), &domain)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::PersistedMismatch {
            kind: LimitKind::SoftLimit,
            actual: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_persisted_check_is_exact() {
    let host = FakeLibvirt::new();
    host.apply(LimitKind::HardLimit, 900_000);
    // Within tolerance elsewhere, but the definition must hold the exact value
    host.set_document(LimitKind::HardLimit, Some(899_999));
    let domain = FakeDomain::new(host.clone());

    let check = verifier(&host)
        .verify(LimitKind::HardLimit, 900_000, host.cgroup_path(), &domain)
        .await
        .unwrap();

    assert!(matches!(check, LimitCheck::PersistedMismatch(_)));
}
