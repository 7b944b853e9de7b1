// SPDX-License-Identifier: GPL-3.0-only

//! Partition table backends
//!
//! A backend opens a device, the device opens its partition table, and the
//! table takes edits that only reach the kernel on [`BackendPartitionTable::commit`].
//! Every command a backend issues runs through the Job's context so it lands
//! on the Job's report.

mod sfdisk;

use storage_types::{Device, Partition};

use crate::error::JobError;
use crate::job::JobContext;

pub use sfdisk::SfdiskBackend;

pub trait PartitionTableBackend: Send + Sync {
    /// `None` when the device cannot be opened
    fn open_device(
        &self,
        ctx: &mut JobContext<'_>,
        device: &Device,
    ) -> Option<Box<dyn BackendDevice>>;
}

pub trait BackendDevice {
    fn node(&self) -> &str;

    /// `None` when the device carries no readable partition table
    fn open_partition_table(&mut self) -> Option<Box<dyn BackendPartitionTable>>;
}

pub trait BackendPartitionTable {
    /// Move and/or resize `partition` to span `first..=last` sectors
    fn update_geometry(
        &mut self,
        ctx: &mut JobContext<'_>,
        partition: &Partition,
        first: u64,
        last: u64,
    ) -> Result<(), JobError>;

    /// Set the partition name (GPT only)
    fn set_partition_label(
        &mut self,
        ctx: &mut JobContext<'_>,
        partition: &Partition,
        label: &str,
    ) -> Result<(), JobError>;

    /// Tell the kernel about the edits
    fn commit(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError>;
}
