// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{FileSystemKind, JobStatus};

use super::{SharedPartition, lock, snapshot};
use crate::error::JobError;
use crate::fs::FileSystemRegistry;
use crate::job::{Job, JobContext};

pub struct CreateFileSystemJob {
    partition: SharedPartition,
    registry: FileSystemRegistry,
    kind: FileSystemKind,
}

impl CreateFileSystemJob {
    pub fn new(partition: SharedPartition, registry: FileSystemRegistry, kind: FileSystemKind) -> Self {
        Self {
            partition,
            registry,
            kind,
        }
    }
}

impl Job for CreateFileSystemJob {
    fn description(&self) -> String {
        format!(
            "Create file system {} on partition {}",
            self.kind,
            snapshot(&self.partition).node
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let partition = snapshot(&self.partition);
        let fs = self.registry.get(self.kind);

        if !fs.capabilities().create.is_supported() {
            return Err(fs.unsupported("Creating"));
        }

        let capacity = partition.capacity();
        if capacity < fs.min_capacity() || capacity > fs.max_capacity() {
            return Err(JobError::Failed(format!(
                "A {} file system does not fit on {} ({} bytes)",
                self.kind, partition.node, capacity
            )));
        }

        fs.create(ctx, &partition.node)
    }

    fn preview(&mut self, status: JobStatus) {
        if status == JobStatus::Success {
            let mut partition = lock(&self.partition);
            partition.file_system = self.kind;
            partition.file_system_label.clear();
        }
    }
}
