// SPDX-License-Identifier: GPL-3.0-only

use std::cmp::Ordering;

use super::{SharedPartition, snapshot};
use crate::error::JobError;
use crate::fs::{CommandSupport, FileSystemRegistry};
use crate::job::{Job, JobContext};

/// Resize the filesystem on a partition to a new length in sectors
///
/// The partition geometry itself is left alone; growing expects the partition
/// to have grown already, shrinking has to happen before it shrinks.
pub struct ResizeFileSystemJob {
    partition: SharedPartition,
    registry: FileSystemRegistry,
    current_length: Option<u64>,
    new_length: u64,
}

impl ResizeFileSystemJob {
    pub fn new(partition: SharedPartition, registry: FileSystemRegistry, new_length: u64) -> Self {
        Self {
            partition,
            registry,
            current_length: None,
            new_length,
        }
    }

    /// Length of the filesystem before resizing, when it differs from the partition's
    pub fn from_length(mut self, length: u64) -> Self {
        self.current_length = Some(length);
        self
    }
}

impl Job for ResizeFileSystemJob {
    fn description(&self) -> String {
        format!(
            "Resize file system on partition {} to {} sectors",
            snapshot(&self.partition).node,
            self.new_length
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let partition = snapshot(&self.partition);
        let fs = self.registry.get(partition.file_system);

        let current = self.current_length.unwrap_or_else(|| partition.length());
        let support = match self.new_length.cmp(&current) {
            Ordering::Equal => {
                ctx.report()
                    .line("The file system already has the requested size, nothing to do");
                return Ok(());
            }
            Ordering::Greater => fs.capabilities().grow,
            Ordering::Less => fs.capabilities().shrink,
        };

        let new_capacity = self.new_length * partition.sector_size;
        if new_capacity < fs.min_capacity() || new_capacity > fs.max_capacity() {
            return Err(JobError::Failed(format!(
                "{} bytes is outside the size limits of {} file systems",
                new_capacity, partition.file_system
            )));
        }

        match support {
            CommandSupport::FileSystem => {
                let result = fs.resize(ctx, &partition.node, new_capacity);
                ctx.progress(100);
                result
            }
            CommandSupport::Core => {
                ctx.report()
                    .line("The file system needs no resizing of its own");
                Ok(())
            }
            CommandSupport::None => Err(fs.unsupported("Resizing")),
        }
    }
}
