// SPDX-License-Identifier: GPL-3.0-only

use storage_sys::SysError;
use thiserror::Error;
use zbus::fdo;

/// Helper service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("D-Bus error: {0}")]
    DBus(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<ServiceError> for fdo::Error {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::AuthorizationFailed(msg) => fdo::Error::AccessDenied(msg),
            ServiceError::InvalidArgument(msg) => fdo::Error::InvalidArgs(msg),
            ServiceError::DeviceNotFound(msg) => {
                fdo::Error::Failed(format!("Device not found: {msg}"))
            }
            _ => fdo::Error::Failed(err.to_string()),
        }
    }
}

impl From<zbus::Error> for ServiceError {
    fn from(err: zbus::Error) -> Self {
        ServiceError::DBus(err.to_string())
    }
}

impl From<SysError> for ServiceError {
    fn from(err: SysError) -> Self {
        match err {
            SysError::PermissionDenied(msg) => ServiceError::AuthorizationFailed(msg),
            SysError::DeviceNotFound(msg) => ServiceError::DeviceNotFound(msg),
            SysError::InvalidArgument(msg) => ServiceError::InvalidArgument(msg),
            SysError::Io(e) => ServiceError::IoError(e.to_string()),
            SysError::Cancelled => ServiceError::OperationFailed("cancelled".to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_failures_become_access_denied() {
        let err: fdo::Error = ServiceError::AuthorizationFailed("nope".into()).into();
        assert!(matches!(err, fdo::Error::AccessDenied(msg) if msg == "nope"));
    }

    #[test]
    fn sys_errors_keep_their_category() {
        let err: ServiceError = SysError::DeviceNotFound("/dev/sdz".into()).into();
        assert!(matches!(err, ServiceError::DeviceNotFound(_)));
    }
}
