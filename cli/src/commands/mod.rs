// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the memtune CLI

pub mod check;
pub mod config;
pub mod run;

pub use self::check::CheckArgs;
pub use self::config::ConfigCommand;
pub use self::run::RunArgs;

/// How a test command ended, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
    /// The host cannot run the test at all.
    NotApplicable,
}

impl RunStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::Failed => 1,
            Self::NotApplicable => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Passed.code(), 0);
        assert_eq!(RunStatus::Failed.code(), 1);
        assert_eq!(RunStatus::NotApplicable.code(), 2);
    }
}
