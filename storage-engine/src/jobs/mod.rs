// SPDX-License-Identifier: GPL-3.0-only

//! The concrete Jobs Operations are assembled from
//!
//! Jobs that change a partition share it with the other Jobs of their
//! Operation through a [`SharedPartition`]; each one updates it in its
//! `preview` so the next Job sees the geometry and contents actually on disk.

mod check;
mod copy;
mod create;
mod deactivate;
mod geometry;
mod label;
mod resize;
mod write;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use storage_types::Partition;

pub use check::CheckFileSystemJob;
pub use copy::{CopyBlocksJob, SharedBuffer};
pub use create::CreateFileSystemJob;
pub use deactivate::DeactivateLogicalVolumeJob;
pub use geometry::SetPartGeometryJob;
pub use label::{SetFileSystemLabelJob, SetPartitionLabelJob};
pub use resize::ResizeFileSystemJob;
pub use write::WriteDataJob;

pub type SharedPartition = Arc<Mutex<Partition>>;

pub fn shared(partition: Partition) -> SharedPartition {
    Arc::new(Mutex::new(partition))
}

pub(crate) fn lock(partition: &SharedPartition) -> MutexGuard<'_, Partition> {
    partition.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Copy of the partition as it currently stands
pub fn snapshot(partition: &SharedPartition) -> Partition {
    lock(partition).clone()
}
