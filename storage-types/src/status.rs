// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Status of a single Job; there is no partial or warning completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Success,
    Error,
}

/// Status of an Operation over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Nothing queued or the run was cancelled before reaching it
    None,
    #[default]
    Pending,
    Running,
    Success,
    Warning,
    Error,
}

impl OperationStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Warning | Self::Error)
    }
}
