// SPDX-License-Identifier: GPL-3.0-only

//! The privileged command channel
//!
//! Every external action a Job takes goes through [`CommandChannel`]: it
//! resolves the executable, records what it is about to run in the report,
//! performs the authorization handshake on first use and hands the request to
//! the helper transport. Channel failures never escape as errors; they come
//! back as failed results, which Jobs handle like any other failed command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storage_contracts::{ChannelError, HelperTransport};
use storage_types::{CommandRequest, CommandResult, CopyEndpoint, Report};

use crate::config::EngineConfig;
use crate::logging::COMMAND_TARGET;
use crate::session::AuthSession;

/// Environment switch echoing every dispatched command line
pub const DEBUG_ENV: &str = "COSMIC_EXT_STORAGE_DEBUG";

/// Result of a block copy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyResult {
    /// Exit code 0 on success, 1 otherwise
    pub result: CommandResult,
    /// Bytes produced for an in-memory target
    pub target_data: Option<Vec<u8>>,
}

pub struct CommandChannel {
    transport: Arc<dyn HelperTransport>,
    session: AuthSession,
    search_dirs: Vec<PathBuf>,
    block_size: u64,
    echo: bool,
}

impl CommandChannel {
    pub fn new(
        transport: Arc<dyn HelperTransport>,
        session: AuthSession,
        config: &EngineConfig,
    ) -> Self {
        Self {
            transport,
            session,
            search_dirs: config.privileged_search_dirs.clone(),
            block_size: config.block_size,
            echo: std::env::var_os(DEBUG_ENV).is_some(),
        }
    }

    /// Echo command lines on [`COMMAND_TARGET`]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Full path of `program`, or the bare name if it cannot be found
    pub fn resolve(&self, program: &str) -> String {
        if program.contains('/') {
            return program.to_string();
        }
        if let Ok(path) = which::which(program) {
            return path.to_string_lossy().into_owned();
        }
        for dir in &self.search_dirs {
            let candidate = dir.join(program);
            if is_executable(&candidate) {
                return candidate.to_string_lossy().into_owned();
            }
        }
        tracing::debug!("{} not found, dispatching the bare name", program);
        program.to_string()
    }

    /// Whether `program` can be found at all
    pub fn find_executable(&self, program: &str) -> bool {
        self.resolve(program).contains('/')
    }

    /// Run a command through the helper and wait for it to finish
    ///
    /// With a report, the command line, exit code and output are recorded on
    /// a new child node of it.
    pub fn run(&self, report: Option<&mut Report>, request: CommandRequest) -> CommandResult {
        let request = CommandRequest {
            command: self.resolve(&request.command),
            ..request
        };

        let mut node = report.map(|r| {
            let node = r.new_child(format!("Command: {}", request.command_line()));
            node.set_command(request.command_line());
            node
        });

        self.echo_request(&request);

        let result = self
            .dispatch(|transport| transport.start(&request))
            .unwrap_or_else(|e| {
                if let Some(node) = node.as_deref_mut() {
                    node.line(e.to_string());
                }
                CommandResult::never_completed()
            });

        if let Some(node) = node {
            node.set_exit_code(result.exit_code);
            node.append_output(&result.output());
        }

        result
    }

    /// Copy `source` to `target` through the helper in fixed-size blocks
    ///
    /// An in-memory target has to be empty; a pre-filled one is refused
    /// without contacting the helper.
    pub fn copy_blocks(
        &self,
        report: Option<&mut Report>,
        source: &CopyEndpoint,
        target: &CopyEndpoint,
        progress: &mut dyn FnMut(u8),
    ) -> CopyResult {
        let line = format!("Copy {} to {}", source.describe(), target.describe());

        let mut node = report.map(|r| {
            let node = r.new_child(line.clone());
            node.set_command(line.clone());
            node
        });

        if self.echo {
            tracing::info!(target: COMMAND_TARGET, "{}", line);
        }

        let reply = if target.is_prefilled_buffer() {
            Err(ChannelError::Protocol(
                "in-memory copy targets must start out empty".to_string(),
            ))
        } else {
            self.dispatch(|transport| {
                transport.copy_blocks(source, target, self.block_size, progress)
            })
        };

        let (success, target_data) = match reply {
            Ok(reply) => (reply.success, reply.target_data),
            Err(e) => {
                if let Some(node) = node.as_deref_mut() {
                    node.line(e.to_string());
                }
                (false, None)
            }
        };

        if let Some(node) = node {
            node.set_exit_code(i32::from(!success));
        }

        CopyResult {
            result: CommandResult::from_success(success),
            target_data,
        }
    }

    /// Write `buffer` at `first_byte` of `device`
    pub fn write_data(&self, buffer: &[u8], device: &str, first_byte: u64) -> CommandResult {
        if self.echo {
            tracing::info!(
                target: COMMAND_TARGET,
                "Write {} bytes to {} at byte {}",
                buffer.len(),
                device,
                first_byte
            );
        }
        match self.dispatch(|transport| transport.write_data(buffer, device, first_byte)) {
            Ok(success) => CommandResult::from_success(success),
            Err(e) => {
                tracing::warn!("Writing to {} failed: {}", device, e);
                CommandResult::from_success(false)
            }
        }
    }

    /// Ask a running helper to stop
    pub fn stop_helper(&self) -> Result<(), ChannelError> {
        if !self.session.helper_started() {
            return Ok(());
        }
        self.transport.shutdown()
    }

    fn dispatch<T>(
        &self,
        call: impl FnOnce(&dyn HelperTransport) -> Result<T, ChannelError>,
    ) -> Result<T, ChannelError> {
        if !self.transport.bus_available() {
            tracing::error!("No message bus, privileged commands are unavailable");
            return Err(ChannelError::BusUnavailable(
                "cannot reach the system message bus".to_string(),
            ));
        }

        self.session.ensure_started(self.transport.as_ref())?;

        call(self.transport.as_ref()).inspect_err(|e| tracing::warn!("{}", e))
    }

    fn echo_request(&self, request: &CommandRequest) {
        if !self.echo {
            return;
        }
        tracing::info!(target: COMMAND_TARGET, "{}", request.command_line());
        if let Some(input) = &request.input {
            tracing::info!(
                target: COMMAND_TARGET,
                "input: {}",
                String::from_utf8_lossy(input).trim_end()
            );
        }
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use storage_contracts::{CopyReply, ReadyWaiter};
    use storage_testing::{FakeAuthority, LoopbackTransport, ScriptedTransport, TransportCall};
    use storage_types::NEVER_COMPLETED;

    /// Scripted transport whose copies stall and then time out
    struct StallingCopy {
        inner: ScriptedTransport,
        copy_entered: Mutex<Option<DateTime<Utc>>>,
    }

    impl HelperTransport for StallingCopy {
        fn bus_available(&self) -> bool {
            self.inner.bus_available()
        }

        fn helper_registered(&self) -> Result<bool, ChannelError> {
            self.inner.helper_registered()
        }

        fn launch_helper(&self) -> Result<Box<dyn ReadyWaiter>, ChannelError> {
            self.inner.launch_helper()
        }

        fn start(&self, request: &CommandRequest) -> Result<CommandResult, ChannelError> {
            self.inner.start(request)
        }

        fn copy_blocks(
            &self,
            _source: &CopyEndpoint,
            _target: &CopyEndpoint,
            _block_size: u64,
            _progress: &mut dyn FnMut(u8),
        ) -> Result<CopyReply, ChannelError> {
            if let Ok(mut entered) = self.copy_entered.lock() {
                *entered = Some(Utc::now());
            }
            std::thread::sleep(Duration::from_millis(20));
            Err(ChannelError::Timeout(Duration::from_millis(20)))
        }

        fn write_data(&self, buffer: &[u8], target: &str, first_byte: u64) -> Result<bool, ChannelError> {
            self.inner.write_data(buffer, target, first_byte)
        }

        fn shutdown(&self) -> Result<(), ChannelError> {
            self.inner.shutdown()
        }
    }

    fn channel(transport: Arc<dyn HelperTransport>, config: &EngineConfig) -> CommandChannel {
        let session = AuthSession::new(Arc::new(FakeAuthority::granting()), config);
        CommandChannel::new(transport, session, config).with_echo(false)
    }

    #[test]
    fn unresolvable_command_never_completes() {
        let channel = channel(Arc::new(LoopbackTransport::new()), &EngineConfig::default());
        let result = channel.run(None, CommandRequest::new("no-such-tool-0815", ["--help"]));
        assert!(!result.success);
        assert_eq!(result.exit_code, NEVER_COMPLETED);
    }

    #[test]
    fn command_line_is_recorded_before_dispatch() {
        let transport = ScriptedTransport::new();
        transport.respond_output("sfdisk", "label: gpt\n");
        let channel = channel(Arc::new(transport.clone()), &EngineConfig::default());

        let mut report = Report::new("job");
        let result = channel.run(
            Some(&mut report),
            CommandRequest::new("sfdisk", ["--dump", "/dev/sda"]),
        );

        assert!(result.succeeded());
        let node = &report.children[0];
        assert!(node.command.as_deref().is_some_and(|c| c.ends_with("sfdisk --dump /dev/sda")));
        assert_eq!(node.exit_code, Some(0));
        assert_eq!(node.lines, ["label: gpt"]);
    }

    #[test]
    fn bus_outage_fails_without_contacting_the_helper() {
        let transport = ScriptedTransport::new();
        transport.set_bus_available(false);
        let channel = channel(Arc::new(transport.clone()), &EngineConfig::default());

        let result = channel.run(None, CommandRequest::new("true", Vec::<String>::new()));

        assert!(!result.success);
        assert_eq!(result.exit_code, NEVER_COMPLETED);
        assert!(transport.calls().is_empty());
        assert!(!channel.session().helper_started());
    }

    #[test]
    fn resolution_falls_back_to_privileged_dirs() {
        let dir = tempfile::tempdir().expect("temp dir");
        let tool = dir.path().join("only-in-sbin-tool");
        std::fs::write(&tool, b"#!/bin/sh\n").expect("write");
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let config = EngineConfig {
            privileged_search_dirs: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let channel = channel(Arc::new(ScriptedTransport::new()), &config);

        assert_eq!(channel.resolve("only-in-sbin-tool"), tool.to_string_lossy());
        assert_eq!(channel.resolve("missing-everywhere"), "missing-everywhere");
        assert!(!channel.find_executable("missing-everywhere"));
    }

    #[test]
    fn buffer_copy_returns_target_bytes() {
        let channel = channel(Arc::new(LoopbackTransport::new()), &EngineConfig::default());
        let source = CopyEndpoint::buffer(b"partition table".to_vec());
        let target = CopyEndpoint::buffer_target(2);

        let mut seen = Vec::new();
        let copy = channel.copy_blocks(None, &source, &target, &mut |p| seen.push(p));

        assert_eq!(copy.result.exit_code, 0);
        assert!(copy.result.success);
        assert_eq!(&copy.target_data.expect("bytes")[2..], b"partition table");
        assert_eq!(seen, [100]);
    }

    #[test]
    fn copy_is_recorded_before_dispatch() {
        let transport = Arc::new(StallingCopy {
            inner: ScriptedTransport::new(),
            copy_entered: Mutex::new(None),
        });
        let channel = channel(transport.clone(), &EngineConfig::default());
        let source = CopyEndpoint::path("/dev/sdb", 0, 4096);
        let target = CopyEndpoint::path("/dev/sdc", 1024, 4096);

        let mut report = Report::new("job");
        let copy = channel.copy_blocks(Some(&mut report), &source, &target, &mut |_| {});

        assert!(!copy.result.success);
        let node = &report.children[0];
        assert_eq!(node.command.as_deref(), Some("Copy /dev/sdb [0..4096) to /dev/sdc [1024..5120)"));
        assert_eq!(node.exit_code, Some(1));
        assert_eq!(node.lines.len(), 1);
        assert!(node.lines[0].starts_with("No reply from the privileged helper"));

        let entered = transport
            .copy_entered
            .lock()
            .ok()
            .and_then(|e| *e)
            .expect("copy dispatched");
        assert!(node.started_at.is_some_and(|started| started <= entered));
    }

    #[test]
    fn prefilled_buffer_target_is_refused() {
        let transport = ScriptedTransport::new();
        let channel = channel(Arc::new(transport.clone()), &EngineConfig::default());
        let source = CopyEndpoint::buffer(b"new".to_vec());
        let target = CopyEndpoint::buffer(b"old bytes".to_vec());

        let mut report = Report::new("job");
        let copy = channel.copy_blocks(Some(&mut report), &source, &target, &mut |_| {});

        assert!(!copy.result.success);
        assert!(copy.target_data.is_none());
        assert!(transport.calls().is_empty());
        let node = &report.children[0];
        assert_eq!(node.exit_code, Some(1));
        assert!(node.lines.iter().any(|l| l.contains("must start out empty")));
    }

    #[test]
    fn write_data_and_stop_reach_the_transport() {
        let transport = ScriptedTransport::new();
        let channel = channel(Arc::new(transport.clone()), &EngineConfig::default());

        assert!(channel.stop_helper().is_ok());
        assert!(transport.calls().is_empty());

        let result = channel.write_data(b"abc", "/dev/sdb", 512);
        assert_eq!(result.exit_code, 0);
        channel.stop_helper().expect("stop");

        assert_eq!(
            transport.calls(),
            [
                TransportCall::Launch,
                TransportCall::WriteData {
                    target: "/dev/sdb".to_string(),
                    first_byte: 512,
                    len: 3,
                },
                TransportCall::Shutdown,
            ]
        );
    }
}
