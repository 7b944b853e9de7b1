// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use storage_types::{CommandRequest, CommandResult, CopyEndpoint};

use crate::ChannelError;

/// Reply to a block copy request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReply {
    pub success: bool,
    /// Bytes produced for an in-memory target
    pub target_data: Option<Vec<u8>>,
}

/// Pending readiness notification of a helper that is being started
///
/// Obtained before the helper is launched so the notification cannot be missed.
pub trait ReadyWaiter: Send {
    fn wait(self: Box<Self>, timeout: Duration) -> Result<(), ChannelError>;
}

/// Request/response link to the privileged helper
///
/// Every call blocks the calling thread until the helper replies. Each call is
/// its own request/response pair, so concurrent callers never see each other's
/// replies.
pub trait HelperTransport: Send + Sync {
    /// Whether the message bus itself can be reached
    fn bus_available(&self) -> bool;

    /// Whether a helper instance already owns its bus name
    fn helper_registered(&self) -> Result<bool, ChannelError>;

    /// Ask the bus to start the helper
    ///
    /// The returned waiter resolves once the helper announced that it accepts
    /// commands.
    fn launch_helper(&self) -> Result<Box<dyn ReadyWaiter>, ChannelError>;

    fn start(&self, request: &CommandRequest) -> Result<CommandResult, ChannelError>;

    /// Copy `source` to `target`; `progress` receives per-block percentages
    fn copy_blocks(
        &self,
        source: &CopyEndpoint,
        target: &CopyEndpoint,
        block_size: u64,
        progress: &mut dyn FnMut(u8),
    ) -> Result<CopyReply, ChannelError>;

    fn write_data(&self, buffer: &[u8], target: &str, first_byte: u64) -> Result<bool, ChannelError>;

    /// Ask the helper to stop, aborting in-flight copies
    fn shutdown(&self) -> Result<(), ChannelError>;
}
