// SPDX-License-Identifier: GPL-3.0-only

use storage_types::JobStatus;

use super::{SharedPartition, snapshot};
use crate::error::JobError;
use crate::fs::FileSystemRegistry;
use crate::job::{Job, JobContext};

/// Check and repair the filesystem on a partition
///
/// Filesystems without a check tool are skipped, not failed.
pub struct CheckFileSystemJob {
    partition: SharedPartition,
    registry: FileSystemRegistry,
}

impl CheckFileSystemJob {
    pub fn new(partition: SharedPartition, registry: FileSystemRegistry) -> Self {
        Self {
            partition,
            registry,
        }
    }
}

impl Job for CheckFileSystemJob {
    fn description(&self) -> String {
        format!("Check file system on partition {}", snapshot(&self.partition).node)
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let partition = snapshot(&self.partition);
        let fs = self.registry.get(partition.file_system);

        if !fs.capabilities().check.is_supported() {
            ctx.report().line(format!(
                "Checking {} file systems is not supported, skipped",
                partition.file_system
            ));
            return Ok(());
        }

        fs.check(ctx, &partition.node)
    }

    fn preview(&mut self, status: JobStatus) {
        if status == JobStatus::Error {
            tracing::warn!(
                "File system on {} failed its check",
                snapshot(&self.partition).node
            );
        }
    }
}
