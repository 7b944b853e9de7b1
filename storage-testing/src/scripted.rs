// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storage_contracts::{ChannelError, CopyReply, HelperTransport, ReadyWaiter};
use storage_types::{CommandRequest, CommandResult, CopyEndpoint};

/// A request the transport received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Launch,
    Start(CommandRequest),
    CopyBlocks {
        source: String,
        target: String,
        block_size: u64,
    },
    WriteData {
        target: String,
        first_byte: u64,
        len: usize,
    },
    Shutdown,
}

struct Ready;

impl ReadyWaiter for Ready {
    fn wait(self: Box<Self>, _timeout: Duration) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Transport that answers from a script and records every request
///
/// Commands are matched on the file name of the executable, so a script
/// entry for `mkfs.xfs` answers `/usr/sbin/mkfs.xfs` too. Unscripted
/// commands succeed with empty output.
#[derive(Clone)]
pub struct ScriptedTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    responses: Arc<Mutex<HashMap<String, Vec<CommandResult>>>>,
    bus_up: Arc<AtomicBool>,
    registered: Arc<AtomicBool>,
    launches: Arc<AtomicUsize>,
    copy_progress: Arc<Mutex<Vec<u8>>>,
    copy_success: Arc<AtomicBool>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(HashMap::new())),
            bus_up: Arc::new(AtomicBool::new(true)),
            registered: Arc::new(AtomicBool::new(false)),
            launches: Arc::new(AtomicUsize::new(0)),
            copy_progress: Arc::new(Mutex::new(Vec::new())),
            copy_success: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Queue `result` for the next run of `program`; the last queued
    /// result repeats once the queue is down to one
    pub fn respond(&self, program: &str, result: CommandResult) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.entry(program.to_string()).or_default().push(result);
        }
        self
    }

    pub fn respond_output(&self, program: &str, output: &str) -> &Self {
        self.respond(program, CommandResult::completed(0, output.as_bytes().to_vec(), true))
    }

    pub fn fail(&self, program: &str, exit_code: i32) -> &Self {
        self.respond(program, CommandResult::completed(exit_code, Vec::new(), true))
    }

    pub fn set_bus_available(&self, up: bool) {
        self.bus_up.store(up, Ordering::SeqCst);
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    pub fn set_copy_progress(&self, percents: Vec<u8>) {
        if let Ok(mut progress) = self.copy_progress.lock() {
            *progress = percents;
        }
    }

    pub fn set_copy_success(&self, success: bool) {
        self.copy_success.store(success, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Command lines of every `Start` request, with executables reduced to
    /// their file name
    pub fn command_lines(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Start(req) => {
                    let mut line = program_name(&req.command).to_string();
                    for arg in &req.args {
                        line.push(' ');
                        line.push_str(arg);
                    }
                    Some(line)
                }
                _ => None,
            })
            .collect()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn record(&self, call: TransportCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

fn program_name(command: &str) -> &str {
    Path::new(command)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(command)
}

impl HelperTransport for ScriptedTransport {
    fn bus_available(&self) -> bool {
        self.bus_up.load(Ordering::SeqCst)
    }

    fn helper_registered(&self) -> Result<bool, ChannelError> {
        Ok(self.registered.load(Ordering::SeqCst))
    }

    fn launch_helper(&self) -> Result<Box<dyn ReadyWaiter>, ChannelError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.record(TransportCall::Launch);
        Ok(Box::new(Ready))
    }

    fn start(&self, request: &CommandRequest) -> Result<CommandResult, ChannelError> {
        self.record(TransportCall::Start(request.clone()));

        let program = program_name(&request.command);
        let scripted = self.responses.lock().ok().and_then(|mut responses| {
            let queue = responses.get_mut(program)?;
            if queue.len() > 1 {
                Some(queue.remove(0))
            } else {
                queue.first().cloned()
            }
        });

        Ok(scripted.unwrap_or_else(|| CommandResult::completed(0, Vec::new(), true)))
    }

    fn copy_blocks(
        &self,
        source: &CopyEndpoint,
        target: &CopyEndpoint,
        block_size: u64,
        progress: &mut dyn FnMut(u8),
    ) -> Result<CopyReply, ChannelError> {
        self.record(TransportCall::CopyBlocks {
            source: source.describe(),
            target: target.describe(),
            block_size,
        });

        let percents = self.copy_progress.lock().map(|p| p.clone()).unwrap_or_default();
        for percent in percents {
            progress(percent);
        }

        Ok(CopyReply {
            success: self.copy_success.load(Ordering::SeqCst),
            target_data: target.is_buffer().then(Vec::new),
        })
    }

    fn write_data(&self, buffer: &[u8], target: &str, first_byte: u64) -> Result<bool, ChannelError> {
        self.record(TransportCall::WriteData {
            target: target.to_string(),
            first_byte,
            len: buffer.len(),
        });
        Ok(true)
    }

    fn shutdown(&self) -> Result<(), ChannelError> {
        self.record(TransportCall::Shutdown);
        self.registered.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_results_are_consumed_in_order() {
        let transport = ScriptedTransport::new();
        transport.fail("e2fsck", 4).respond_output("e2fsck", "clean");

        let req = CommandRequest::new("/usr/sbin/e2fsck", ["-f", "/dev/sda1"]);
        assert_eq!(transport.start(&req).expect("start").exit_code, 4);
        assert_eq!(transport.start(&req).expect("start").output(), "clean");
        assert_eq!(transport.start(&req).expect("start").output(), "clean");

        assert_eq!(transport.command_lines()[0], "e2fsck -f /dev/sda1");
    }

    #[test]
    fn unscripted_commands_succeed() {
        let transport = ScriptedTransport::new();
        let result = transport
            .start(&CommandRequest::new("partx", ["--update", "/dev/sda"]))
            .expect("start");
        assert!(result.succeeded());
    }
}
