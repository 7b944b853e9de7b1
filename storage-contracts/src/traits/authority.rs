// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{AuthorizationResult, CallerInfo};

use crate::ChannelError;

/// The system's policy-decision service
pub trait PolicyAuthority: Send + Sync {
    /// Decide whether `caller` may perform `action_id`, interacting with the
    /// user if the policy asks for it
    fn authorize_action(
        &self,
        action_id: &str,
        caller: &CallerInfo,
    ) -> Result<AuthorizationResult, ChannelError>;
}
