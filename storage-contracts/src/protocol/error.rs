// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use thiserror::Error;

/// Failures of the privileged command channel
///
/// Jobs never see these directly: the channel folds them into a failed
/// command result so a Job treats them like any other failed command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Message bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("Privileged helper unreachable: {0}")]
    HelperUnreachable(String),

    #[error("The privileged helper is already in use by another process")]
    HelperConflict,

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("No reply from the privileged helper within {0:?}")]
    Timeout(Duration),

    #[error("Helper protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Runtime(String),
}

impl ChannelError {
    /// True when no request could have reached the helper
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::BusUnavailable(_) | Self::HelperConflict | Self::Runtime(_)
        )
    }
}

impl From<zbus::Error> for ChannelError {
    fn from(e: zbus::Error) -> Self {
        match &e {
            zbus::Error::MethodError(name, detail, _) => {
                let detail = detail.clone().unwrap_or_default();
                match name.as_str() {
                    "org.freedesktop.DBus.Error.AccessDenied"
                    | "org.freedesktop.DBus.Error.AuthFailed" => Self::AuthorizationDenied(detail),
                    "org.freedesktop.DBus.Error.ServiceUnknown"
                    | "org.freedesktop.DBus.Error.NameHasNoOwner"
                    | "org.freedesktop.DBus.Error.NoReply" => Self::HelperUnreachable(detail),
                    other => Self::Protocol(format!("{other}: {detail}")),
                }
            }
            zbus::Error::InputOutput(_) | zbus::Error::Address(_) => {
                Self::BusUnavailable(e.to_string())
            }
            _ => Self::Protocol(e.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for ChannelError {
    fn from(e: zbus::fdo::Error) -> Self {
        match e {
            zbus::fdo::Error::AccessDenied(msg) | zbus::fdo::Error::AuthFailed(msg) => {
                Self::AuthorizationDenied(msg)
            }
            zbus::fdo::Error::ServiceUnknown(msg)
            | zbus::fdo::Error::NameHasNoOwner(msg)
            | zbus::fdo::Error::NoReply(msg) => Self::HelperUnreachable(msg),
            other => Self::Protocol(other.to_string()),
        }
    }
}
