// SPDX-License-Identifier: GPL-3.0-only

use crate::ChannelError;

/// Desktop service that mounts devices as they appear
///
/// A run suppresses it while partitions come and go under its feet.
pub trait AutomountControl: Send + Sync {
    /// Stop automatic mounting; returns whether it was active before
    fn suppress(&self) -> Result<bool, ChannelError>;

    /// Resume automatic mounting
    fn restore(&self) -> Result<(), ChannelError>;
}

/// For systems without an automounter to silence
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAutomount;

impl AutomountControl for NoAutomount {
    fn suppress(&self) -> Result<bool, ChannelError> {
        Ok(false)
    }

    fn restore(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
