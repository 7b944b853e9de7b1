// SPDX-License-Identifier: GPL-3.0-only

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use storage_contracts::{ChannelError, CopyReply, HelperTransport, ReadyWaiter};
use storage_types::{CommandRequest, CommandResult, CopyEndpoint};

struct Ready;

impl ReadyWaiter for Ready {
    fn wait(self: Box<Self>, _timeout: Duration) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Runs helper requests in the calling process through `storage-sys`
///
/// Behaves like a helper that is always reachable, with the rights of the
/// test process.
#[derive(Default)]
pub struct LoopbackTransport {
    running: AtomicBool,
    requests: AtomicUsize,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests served so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl HelperTransport for LoopbackTransport {
    fn bus_available(&self) -> bool {
        true
    }

    fn helper_registered(&self) -> Result<bool, ChannelError> {
        Ok(false)
    }

    fn launch_helper(&self) -> Result<Box<dyn ReadyWaiter>, ChannelError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(Box::new(Ready))
    }

    fn start(&self, request: &CommandRequest) -> Result<CommandResult, ChannelError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(storage_sys::run_command(request))
    }

    fn copy_blocks(
        &self,
        source: &CopyEndpoint,
        target: &CopyEndpoint,
        block_size: u64,
        progress: &mut dyn FnMut(u8),
    ) -> Result<CopyReply, ChannelError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match storage_sys::copy_blocks(source, target, block_size, |p| {
            progress(p.percent());
            ControlFlow::Continue(())
        }) {
            Ok(outcome) => Ok(CopyReply {
                success: true,
                target_data: outcome.target_data,
            }),
            Err(e) => {
                tracing::warn!("Loopback copy failed: {}", e);
                Ok(CopyReply::default())
            }
        }
    }

    fn write_data(&self, buffer: &[u8], target: &str, first_byte: u64) -> Result<bool, ChannelError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(storage_sys::write_data(buffer, Path::new(target), first_byte).is_ok())
    }

    fn shutdown(&self) -> Result<(), ChannelError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
