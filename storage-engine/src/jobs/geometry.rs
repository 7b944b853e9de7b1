// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use storage_types::{CommandRequest, Device, DeviceKind, JobStatus, Partition};

use super::{SharedPartition, lock, snapshot};
use crate::backend::PartitionTableBackend;
use crate::error::JobError;
use crate::job::{Job, JobContext};

/// Move and/or resize a partition in its partition table
///
/// Logical volumes have no table entry; they are resized with `lvresize`.
pub struct SetPartGeometryJob {
    device: Device,
    partition: SharedPartition,
    backend: Arc<dyn PartitionTableBackend>,
    new_first: u64,
    new_length: u64,
}

impl SetPartGeometryJob {
    pub fn new(
        device: Device,
        partition: SharedPartition,
        backend: Arc<dyn PartitionTableBackend>,
        new_first: u64,
        new_length: u64,
    ) -> Self {
        Self {
            device,
            partition,
            backend,
            new_first,
            new_length,
        }
    }

    fn new_last(&self) -> u64 {
        self.new_first + self.new_length - 1
    }

    fn update_table(&self, ctx: &mut JobContext<'_>, partition: &Partition) -> Result<(), JobError> {
        let unavailable = || JobError::DeviceUnavailable {
            device: self.device.node.clone(),
            partition: partition.node.clone(),
        };

        let mut device = self.backend.open_device(ctx, &self.device).ok_or_else(unavailable)?;
        let mut table = device.open_partition_table().ok_or_else(|| {
            JobError::PartitionTable(format!("no partition table found on {}", device.node()))
        })?;

        table.update_geometry(ctx, partition, self.new_first, self.new_last())?;

        if let Err(e) = table.commit(ctx) {
            tracing::warn!("{}", e);
            ctx.report().line(format!("Warning: {e}"));
        }
        Ok(())
    }

    fn resize_logical_volume(
        &self,
        ctx: &mut JobContext<'_>,
        partition: &Partition,
    ) -> Result<(), JobError> {
        if self.new_first != partition.first_sector {
            return Err(JobError::Failed(format!(
                "Logical volume {} cannot be moved",
                partition.node
            )));
        }

        let lv = partition.lv_path.as_deref().unwrap_or(&partition.node);
        let size = format!("{}B", self.new_length * partition.sector_size);
        ctx.run_checked(CommandRequest::new(
            "lvm",
            ["lvresize", "--force", "--size", size.as_str(), lv],
        ))?;
        Ok(())
    }
}

impl Job for SetPartGeometryJob {
    fn description(&self) -> String {
        format!(
            "Set geometry of partition {}: Start sector: {}, length: {}",
            snapshot(&self.partition).node,
            self.new_first,
            self.new_length
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        if self.new_length == 0 {
            return Err(JobError::Failed("A partition cannot be empty".to_string()));
        }

        let partition = snapshot(&self.partition);
        match self.device.kind {
            DeviceKind::Disk | DeviceKind::SoftwareRaid => self.update_table(ctx, &partition),
            DeviceKind::Lvm => self.resize_logical_volume(ctx, &partition),
        }
    }

    fn preview(&mut self, status: JobStatus) {
        if status == JobStatus::Success {
            let mut partition = lock(&self.partition);
            partition.first_sector = self.new_first;
            partition.last_sector = self.new_last();
        }
    }
}
