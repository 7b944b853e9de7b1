// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Answer of the policy-decision service for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationResult {
    Yes,
    No,
    Unknown,
}

impl AuthorizationResult {
    pub fn is_granted(self) -> bool {
        self == Self::Yes
    }
}

/// Process-wide state of the helper authorization session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    #[default]
    NotRequested,
    Requested,
    Granted,
    Denied,
}
