// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use storage_types::{Device, JobStatus};

use super::{SharedPartition, lock, snapshot};
use crate::backend::PartitionTableBackend;
use crate::error::JobError;
use crate::fs::FileSystemRegistry;
use crate::job::{Job, JobContext};

pub struct SetFileSystemLabelJob {
    partition: SharedPartition,
    registry: FileSystemRegistry,
    label: String,
}

impl SetFileSystemLabelJob {
    pub fn new(partition: SharedPartition, registry: FileSystemRegistry, label: impl Into<String>) -> Self {
        Self {
            partition,
            registry,
            label: label.into(),
        }
    }
}

impl Job for SetFileSystemLabelJob {
    fn description(&self) -> String {
        format!(
            "Set file system label on partition {} to \"{}\"",
            snapshot(&self.partition).node,
            self.label
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let partition = snapshot(&self.partition);
        let fs = self.registry.get(partition.file_system);

        if !fs.capabilities().set_label.is_supported() {
            return Err(fs.unsupported("Setting the label"));
        }
        if self.label.chars().count() > fs.max_label_length() {
            return Err(JobError::Failed(format!(
                "Labels of {} file systems are limited to {} characters",
                partition.file_system,
                fs.max_label_length()
            )));
        }

        fs.write_label(ctx, &partition.node, &self.label)
    }

    fn preview(&mut self, status: JobStatus) {
        if status == JobStatus::Success {
            lock(&self.partition).file_system_label = self.label.clone();
        }
    }
}

/// Set a partition's name in a GPT partition table
pub struct SetPartitionLabelJob {
    device: Device,
    partition: SharedPartition,
    backend: Arc<dyn PartitionTableBackend>,
    label: String,
}

impl SetPartitionLabelJob {
    pub fn new(
        device: Device,
        partition: SharedPartition,
        backend: Arc<dyn PartitionTableBackend>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            device,
            partition,
            backend,
            label: label.into(),
        }
    }
}

impl Job for SetPartitionLabelJob {
    fn description(&self) -> String {
        format!(
            "Set the partition label on partition {} to \"{}\"",
            snapshot(&self.partition).node,
            self.label
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let partition = snapshot(&self.partition);

        let mut device = self
            .backend
            .open_device(ctx, &self.device)
            .ok_or_else(|| JobError::DeviceUnavailable {
                device: self.device.node.clone(),
                partition: partition.node.clone(),
            })?;
        let mut table = device.open_partition_table().ok_or_else(|| {
            JobError::PartitionTable(format!("no partition table found on {}", device.node()))
        })?;

        table.set_partition_label(ctx, &partition, &self.label)?;

        if let Err(e) = table.commit(ctx) {
            tracing::warn!("{}", e);
            ctx.report().line(format!("Warning: {e}"));
        }
        Ok(())
    }

    fn preview(&mut self, status: JobStatus) {
        if status == JobStatus::Success {
            lock(&self.partition).label = self.label.clone();
        }
    }
}
