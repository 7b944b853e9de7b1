// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;

use nix::unistd::{Uid, User};
use storage_types::CallerInfo;
use zbus::Connection;
use zbus::message::Header;
use zbus_polkit::policykit1::{AuthorityProxy, CheckAuthorizationFlags, Subject};

use crate::error::{Result, ServiceError};

/// Resolve who sent the message in `header`
pub async fn resolve_caller(connection: &Connection, header: &Header<'_>) -> Result<CallerInfo> {
    let sender = header
        .sender()
        .ok_or_else(|| ServiceError::AuthorizationFailed("No sender in message header".to_string()))?
        .to_string();

    let dbus_proxy = zbus::fdo::DBusProxy::new(connection)
        .await
        .map_err(|e| ServiceError::DBus(format!("Failed to connect to D-Bus: {e}")))?;

    let bus_name: zbus::names::BusName = sender
        .as_str()
        .try_into()
        .map_err(|e| ServiceError::DBus(format!("Invalid bus name: {e}")))?;

    let uid = dbus_proxy
        .get_connection_unix_user(bus_name.clone())
        .await
        .map_err(|e| ServiceError::DBus(format!("Failed to get caller UID: {e}")))?;

    let pid = dbus_proxy
        .get_connection_unix_process_id(bus_name)
        .await
        .map_err(|e| ServiceError::DBus(format!("Failed to get caller PID: {e}")))?;

    let username = match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => Some(user.name),
        _ => {
            tracing::warn!("Failed to resolve username for UID {}", uid);
            None
        }
    };

    tracing::debug!("Sender {} has UID {} and PID {}", sender, uid, pid);

    Ok(CallerInfo::new(uid, pid, username, sender))
}

/// Check Polkit authorization of `caller` for `action_id`
///
/// The policy file decides whether the user is prompted.
pub async fn check_polkit_auth(
    connection: &Connection,
    caller: &CallerInfo,
    action_id: &str,
) -> Result<()> {
    let authority = AuthorityProxy::new(connection)
        .await
        .map_err(|e| ServiceError::DBus(format!("Failed to connect to Polkit: {e}")))?;

    let subject = Subject::new_for_owner(caller.pid, None, None)
        .map_err(|e| ServiceError::AuthorizationFailed(format!("Failed to create subject: {e}")))?;

    let result = authority
        .check_authorization(
            &subject,
            action_id,
            &HashMap::new(),
            CheckAuthorizationFlags::AllowUserInteraction.into(),
            "",
        )
        .await
        .map_err(|e| ServiceError::DBus(format!("Authorization check failed: {e}")))?;

    tracing::debug!(
        "Authorization result for {}: authorized={}, challenged={}",
        action_id,
        result.is_authorized,
        result.is_challenge
    );

    if !result.is_authorized {
        tracing::warn!(
            "Authorization denied for {} (uid {}, pid {})",
            action_id,
            caller.uid,
            caller.pid
        );
        return Err(ServiceError::AuthorizationFailed(format!(
            "Not authorized for action: {}",
            action_id
        )));
    }

    Ok(())
}
