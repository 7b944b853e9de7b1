// SPDX-License-Identifier: GPL-3.0-only

//! The helper interface: runs commands and moves raw bytes as root
//!
//! Blocking work runs on the blocking thread pool so the bus keeps serving
//! other callers while a long copy is in progress.

use std::ops::ControlFlow;
use std::path::PathBuf;

use storage_types::{
    CallerInfo, CommandRequest, CopyEndpoint, CopyLocation, MAX_BUFFER_TARGET, OutputMode,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use zbus::message::Header;
use zbus::object_server::SignalEmitter;
use zbus::{Connection, interface};

use crate::auth::{check_polkit_auth, resolve_caller};
use crate::error::{Result, ServiceError};

pub struct HelperService {
    action_id: String,
    polkit: bool,
    shutdown: CancellationToken,
}

impl HelperService {
    pub fn new(action_id: impl Into<String>, polkit: bool, shutdown: CancellationToken) -> Self {
        Self {
            action_id: action_id.into(),
            polkit,
            shutdown,
        }
    }

    async fn authorize(&self, connection: &Connection, header: &Header<'_>) -> Result<CallerInfo> {
        let caller = resolve_caller(connection, header).await?;
        if self.polkit {
            check_polkit_auth(connection, &caller, &self.action_id).await?;
        }
        Ok(caller)
    }

    /// Tell waiting clients that the helper accepts commands
    pub async fn announce_ready(connection: &Connection, path: &str) -> zbus::Result<()> {
        let emitter = SignalEmitter::new(connection, path)?;
        Self::ready(&emitter).await
    }
}

/// Build the endpoints of a copy request; an empty path is an in-memory endpoint
pub(crate) fn copy_endpoints(
    source_path: String,
    source_first_byte: u64,
    source_length: u64,
    source_data: Vec<u8>,
    target_path: String,
    target_first_byte: u64,
) -> Result<(CopyEndpoint, CopyEndpoint)> {
    let source = if source_path.is_empty() {
        if (source_data.len() as u64) < source_first_byte.saturating_add(source_length) {
            return Err(ServiceError::InvalidArgument(format!(
                "inline source of {} bytes is shorter than the requested range",
                source_data.len()
            )));
        }
        CopyEndpoint {
            location: CopyLocation::Buffer(source_data),
            first_byte: source_first_byte,
            length: source_length,
        }
    } else {
        CopyEndpoint::path(PathBuf::from(source_path), source_first_byte, source_length)
    };

    let target = if target_path.is_empty() {
        let end = target_first_byte.checked_add(source_length);
        if end.is_none_or(|end| end > MAX_BUFFER_TARGET) {
            return Err(ServiceError::InvalidArgument(format!(
                "in-memory target of {source_length} bytes at offset {target_first_byte} exceeds {MAX_BUFFER_TARGET} bytes"
            )));
        }
        CopyEndpoint::buffer_target(target_first_byte)
    } else {
        CopyEndpoint::path(PathBuf::from(target_path), target_first_byte, source_length)
    };

    Ok((source, target))
}

/// Copy on the current thread, reporting per-block percentages to `progress`
pub(crate) fn copy_with_progress(
    source: &CopyEndpoint,
    target: &CopyEndpoint,
    block_size: u64,
    cancel: &CancellationToken,
    progress: &UnboundedSender<u8>,
) -> Result<Vec<u8>> {
    let outcome = storage_sys::copy_blocks(source, target, block_size, |p| {
        let _ = progress.send(p.percent());
        if cancel.is_cancelled() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(outcome.target_data.unwrap_or_default())
}

#[interface(name = "org.cosmic.ext.Storage.Helper")]
impl HelperService {
    /// Emitted once the helper accepts commands
    #[zbus(signal)]
    async fn ready(signal_ctxt: &SignalEmitter<'_>) -> zbus::Result<()>;

    /// Emitted while a block copy makes progress
    #[zbus(signal)]
    async fn progress(signal_ctxt: &SignalEmitter<'_>, percent: i32) -> zbus::Result<()>;

    /// Run an external command and capture its output
    async fn start(
        &self,
        #[zbus(connection)] connection: &Connection,
        #[zbus(header)] header: Header<'_>,
        command: String,
        args: Vec<String>,
        input: Vec<u8>,
        mode: u32,
    ) -> zbus::fdo::Result<(i32, Vec<u8>, bool)> {
        let caller = self.authorize(connection, &header).await?;

        let mut request = CommandRequest::new(command, args).with_mode(OutputMode::from_u32(mode));
        if !input.is_empty() {
            request = request.with_input(input);
        }

        tracing::info!(uid = caller.uid, "Running {}", request.command_line());

        let result = tokio::task::spawn_blocking(move || storage_sys::run_command(&request))
            .await
            .map_err(|e| ServiceError::OperationFailed(format!("Command task failed: {e}")))?;

        tracing::debug!(
            "Command finished: exit code {}, success {}",
            result.exit_code,
            result.success
        );

        Ok((result.exit_code, result.output, result.success))
    }

    /// Copy a byte range in fixed-size blocks
    ///
    /// Failures are reported through the success flag, not as D-Bus errors.
    async fn copy_blocks(
        &self,
        #[zbus(connection)] connection: &Connection,
        #[zbus(header)] header: Header<'_>,
        #[zbus(signal_context)] signal_ctx: SignalEmitter<'_>,
        source_path: String,
        source_first_byte: u64,
        source_length: u64,
        source_data: Vec<u8>,
        target_path: String,
        target_first_byte: u64,
        block_size: u64,
    ) -> zbus::fdo::Result<(bool, Vec<u8>)> {
        self.authorize(connection, &header).await?;

        let (source, target) = copy_endpoints(
            source_path,
            source_first_byte,
            source_length,
            source_data,
            target_path,
            target_first_byte,
        )?;

        tracing::info!(
            "Copying {} -> {} in blocks of {} bytes",
            source.describe(),
            target.describe(),
            block_size
        );

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = self.shutdown.clone();
        let task = tokio::task::spawn_blocking(move || {
            copy_with_progress(&source, &target, block_size, &cancel, &tx)
        });

        // The channel closes when the copy drops its sender
        let mut last = None;
        while let Some(percent) = rx.recv().await {
            if last == Some(percent) {
                continue;
            }
            last = Some(percent);
            if let Err(e) = Self::progress(&signal_ctx, i32::from(percent)).await {
                tracing::debug!("Failed to emit progress: {}", e);
            }
        }

        match task.await {
            Ok(Ok(data)) => Ok((true, data)),
            Ok(Err(e)) => {
                tracing::warn!("Block copy failed: {}", e);
                Ok((false, Vec::new()))
            }
            Err(e) => Err(ServiceError::OperationFailed(format!("Copy task failed: {e}")).into()),
        }
    }

    /// Write `buffer` at `target_first_byte` of `target_device`
    async fn write_data(
        &self,
        #[zbus(connection)] connection: &Connection,
        #[zbus(header)] header: Header<'_>,
        buffer: Vec<u8>,
        target_device: String,
        target_first_byte: u64,
    ) -> zbus::fdo::Result<bool> {
        self.authorize(connection, &header).await?;

        tracing::info!(
            "Writing {} bytes to {} at byte {}",
            buffer.len(),
            target_device,
            target_first_byte
        );

        let result = tokio::task::spawn_blocking(move || {
            storage_sys::write_data(&buffer, std::path::Path::new(&target_device), target_first_byte)
        })
        .await
        .map_err(|e| ServiceError::OperationFailed(format!("Write task failed: {e}")))?;

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!("Write failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Stop the helper; copies in flight stop at their next block
    async fn exit(
        &self,
        #[zbus(connection)] connection: &Connection,
        #[zbus(header)] header: Header<'_>,
    ) -> zbus::fdo::Result<()> {
        let caller = self.authorize(connection, &header).await?;
        tracing::info!("Exit requested by {}", caller.sender);
        self.shutdown.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_paths_are_in_memory_endpoints() {
        let (source, target) =
            copy_endpoints(String::new(), 2, 3, b"abcdef".to_vec(), String::new(), 7).expect("endpoints");
        assert!(source.is_buffer());
        assert!(target.is_buffer());
        assert_eq!(target.first_byte, 7);
    }

    #[test]
    fn short_inline_source_is_rejected() {
        let err = copy_endpoints(String::new(), 4, 10, b"abc".to_vec(), String::new(), 0).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[test]
    fn oversized_in_memory_target_is_rejected() {
        let wrapped =
            copy_endpoints(String::new(), 0, 16, vec![1u8; 16], String::new(), u64::MAX - 4);
        assert!(matches!(wrapped, Err(ServiceError::InvalidArgument(_))));

        let too_large =
            copy_endpoints(String::new(), 0, 16, vec![1u8; 16], String::new(), MAX_BUFFER_TARGET);
        assert!(matches!(too_large, Err(ServiceError::InvalidArgument(_))));

        let device_target = copy_endpoints(
            String::new(),
            0,
            16,
            vec![1u8; 16],
            "/dev/sdb".to_string(),
            MAX_BUFFER_TARGET,
        );
        assert!(device_target.is_ok());
    }

    #[test]
    fn copy_reports_progress_and_returns_target_bytes() {
        let (source, target) =
            copy_endpoints(String::new(), 0, 30, vec![7u8; 30], String::new(), 2).expect("endpoints");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let data = copy_with_progress(&source, &target, 10, &CancellationToken::new(), &tx)
            .expect("copy");
        drop(tx);

        assert_eq!(&data[2..], &[7u8; 30][..]);
        let mut seen = Vec::new();
        while let Ok(p) = rx.try_recv() {
            seen.push(p);
        }
        assert_eq!(seen, [33, 66, 100]);
    }

    #[tokio::test]
    async fn progress_arrives_while_the_copy_runs_on_the_blocking_pool() {
        let (source, target) =
            copy_endpoints(String::new(), 0, 40, vec![3u8; 40], String::new(), 0).expect("endpoints");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::task::spawn_blocking(move || {
            copy_with_progress(&source, &target, 10, &cancel, &tx)
        });

        let mut seen = Vec::new();
        while let Some(percent) = rx.recv().await {
            seen.push(percent);
        }

        let data = task.await.expect("join").expect("copy");
        assert_eq!(data, vec![3u8; 40]);
        assert_eq!(seen, [25, 50, 75, 100]);
    }

    #[test]
    fn cancelled_token_stops_the_copy() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&[1u8; 64]).expect("fill");
        let path = file.path().to_string_lossy().into_owned();

        let (source, target) =
            copy_endpoints(path, 0, 64, Vec::new(), String::new(), 0).expect("endpoints");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = copy_with_progress(&source, &target, 16, &cancel, &tx).unwrap_err();
        assert!(matches!(err, ServiceError::OperationFailed(_)));
    }
}
