// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: limit value types, verification results, collaborator
//! contracts and the test configuration manifest.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by the application and infrastructure layers

pub mod limit;
pub mod comparator;
pub mod verification;
pub mod host;
pub mod error;
pub mod test_config;
