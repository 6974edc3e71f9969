// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Capability check run before any limit is touched.

use tracing::debug;

use crate::domain::error::TestError;
use crate::domain::host::MemtuneCommand;
use crate::domain::limit::LimitKind;

pub const MEMTUNE_COMMAND: &str = "memtune";

/// Fails with [`TestError::Unsupported`] when the management tool has no
/// `memtune` command or its help text lacks any of the three limit options.
pub async fn ensure_memtune_supported(command: &dyn MemtuneCommand) -> Result<(), TestError> {
    if !command.has_command(MEMTUNE_COMMAND).await? {
        return Err(TestError::Unsupported {
            feature: "memtune command".to_string(),
        });
    }

    for kind in LimitKind::ALL {
        if !command.has_option(MEMTUNE_COMMAND, kind.option_name()).await? {
            return Err(TestError::Unsupported {
                feature: format!("memtune option {}", kind.option_flag()),
            });
        }
        debug!("memtune supports {}", kind.option_flag());
    }

    Ok(())
}
