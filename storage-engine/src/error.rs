// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::ChannelError;
use storage_types::FileSystemKind;
use thiserror::Error;

/// Why a Job failed
///
/// The text ends up on the Job's report node; the Job's status is Error
/// whatever the variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Command failed with exit code {exit_code}: {command}")]
    CommandFailed { command: String, exit_code: i32 },

    #[error("{operation} is not supported for {file_system} file systems")]
    Unsupported {
        operation: &'static str,
        file_system: FileSystemKind,
    },

    #[error("Could not open device {device} while trying to change partition {partition}")]
    DeviceUnavailable { device: String, partition: String },

    #[error("Partition table update failed: {0}")]
    PartitionTable(String),

    #[error("Copying {source_range} to {target_range} failed")]
    CopyFailed {
        source_range: String,
        target_range: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors setting the engine up
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Failed to start operation runner: {0}")]
    Spawn(#[from] std::io::Error),
}
