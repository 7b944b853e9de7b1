// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::Arc;

use storage_types::{AuthorizationResult, CallerInfo};
use zbus_polkit::policykit1::{AuthorityProxy, CheckAuthorizationFlags, Subject};

use super::connection::{BusKind, BusRuntime};
use crate::{ChannelError, PolicyAuthority};

/// Policy decisions from polkit on the system bus
pub struct PolkitAuthority {
    bus: Arc<BusRuntime>,
}

impl PolkitAuthority {
    pub fn new(bus: Arc<BusRuntime>) -> Self {
        Self { bus }
    }
}

impl PolicyAuthority for PolkitAuthority {
    fn authorize_action(
        &self,
        action_id: &str,
        caller: &CallerInfo,
    ) -> Result<AuthorizationResult, ChannelError> {
        self.bus.block_on(async {
            let conn = self.bus.connection(BusKind::System).await?;
            let authority = AuthorityProxy::new(&conn).await?;

            let subject = Subject::new_for_owner(caller.pid, None, None).map_err(|e| {
                ChannelError::Protocol(format!("Failed to create polkit subject: {}", e))
            })?;

            let result = authority
                .check_authorization(
                    &subject,
                    action_id,
                    &HashMap::new(),
                    CheckAuthorizationFlags::AllowUserInteraction.into(),
                    "",
                )
                .await?;

            Ok(if result.is_authorized {
                AuthorizationResult::Yes
            } else if result.is_challenge {
                AuthorizationResult::Unknown
            } else {
                AuthorizationResult::No
            })
        })
    }
}
