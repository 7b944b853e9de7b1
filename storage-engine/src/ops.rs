// SPDX-License-Identifier: GPL-3.0-only

//! Operation builders
//!
//! Each function turns one user intent into an [`Operation`] with the Jobs
//! that carry it out, in the order they have to run.

use std::cmp::Ordering;
use std::sync::Arc;

use storage_types::{CopyEndpoint, Device, FileSystemKind};

use crate::backend::PartitionTableBackend;
use crate::error::JobError;
use crate::fs::FileSystemRegistry;
use crate::jobs::{
    CheckFileSystemJob, CopyBlocksJob, CreateFileSystemJob, DeactivateLogicalVolumeJob,
    ResizeFileSystemJob, SetFileSystemLabelJob, SetPartGeometryJob, SetPartitionLabelJob,
    SharedPartition, snapshot,
};
use crate::operation::Operation;

pub fn check(partition: &SharedPartition, registry: &FileSystemRegistry) -> Operation {
    let p = snapshot(partition);
    Operation::new(
        format!("Check and repair partition {} ({})", p.node, p.file_system),
        vec![p.node],
    )
    .with_job(CheckFileSystemJob::new(partition.clone(), registry.clone()))
}

pub fn create_file_system(
    partition: &SharedPartition,
    registry: &FileSystemRegistry,
    kind: FileSystemKind,
) -> Operation {
    let p = snapshot(partition);
    Operation::new(
        format!("Format {} with {}", p.node, kind),
        vec![p.node],
    )
    .with_job(CreateFileSystemJob::new(partition.clone(), registry.clone(), kind))
    .with_job(CheckFileSystemJob::new(partition.clone(), registry.clone()))
}

/// Resize and/or move a partition to `new_first..=new_last` together with its filesystem
///
/// A shrinking filesystem shrinks before its partition, a growing one grows
/// after it. Moves copy the data to the new start first. The filesystem is
/// checked before anything happens and again at the end.
///
/// # Errors
///
/// [`JobError::InvalidRequest`] if `new_last` is before `new_first`.
pub fn resize(
    device: &Device,
    partition: &SharedPartition,
    registry: &FileSystemRegistry,
    backend: &Arc<dyn PartitionTableBackend>,
    new_first: u64,
    new_last: u64,
) -> Result<Operation, JobError> {
    let p = snapshot(partition);
    if new_last < new_first {
        return Err(JobError::InvalidRequest(format!(
            "{} cannot end at sector {new_last} before its new start {new_first}",
            p.node
        )));
    }

    let old_length = p.length();
    let new_length = new_last - new_first + 1;
    let moving = new_first != p.first_sector;

    let verb = match (moving, new_length.cmp(&old_length)) {
        (true, Ordering::Equal) => "Move",
        (false, _) => "Resize",
        (true, _) => "Resize and move",
    };
    let mut op = Operation::new(
        format!(
            "{verb} partition {} from {} to {} sectors starting at {}",
            p.node, old_length, new_length, new_first
        ),
        vec![p.node.clone()],
    );

    let geometry = |first: u64, length: u64| {
        SetPartGeometryJob::new(device.clone(), partition.clone(), backend.clone(), first, length)
    };
    let fs_resize = |from: u64, to: u64| {
        ResizeFileSystemJob::new(partition.clone(), registry.clone(), to).from_length(from)
    };

    op = op.with_job(CheckFileSystemJob::new(partition.clone(), registry.clone()));

    let mut length = old_length;
    if new_length < old_length {
        op = op
            .with_job(fs_resize(old_length, new_length))
            .with_job(geometry(p.first_sector, new_length));
        length = new_length;
    }

    if moving {
        let bytes = length * p.sector_size;
        let source = CopyEndpoint::path(&device.node, p.first_byte(), bytes);
        let target = CopyEndpoint::path(&device.node, new_first * p.sector_size, bytes);
        op = op
            .with_job(CopyBlocksJob::new(source, target))
            .with_job(geometry(new_first, length));
    }

    if new_length > old_length {
        op = op
            .with_job(geometry(new_first, new_length))
            .with_job(fs_resize(length, new_length));
    }

    Ok(op.with_job(CheckFileSystemJob::new(partition.clone(), registry.clone())))
}

pub fn set_file_system_label(
    partition: &SharedPartition,
    registry: &FileSystemRegistry,
    label: &str,
) -> Operation {
    let p = snapshot(partition);
    Operation::new(
        format!("Set file system label \"{}\" on {}", label, p.node),
        vec![p.node],
    )
    .with_job(SetFileSystemLabelJob::new(partition.clone(), registry.clone(), label))
}

pub fn set_partition_label(
    device: &Device,
    partition: &SharedPartition,
    backend: &Arc<dyn PartitionTableBackend>,
    label: &str,
) -> Operation {
    let p = snapshot(partition);
    Operation::new(
        format!("Set partition label \"{}\" on {}", label, p.node),
        vec![p.node],
    )
    .with_job(SetPartitionLabelJob::new(
        device.clone(),
        partition.clone(),
        backend.clone(),
        label,
    ))
}

/// Copy a partition's contents onto another partition
///
/// The target ends up with the source's filesystem, grown to fill the target
/// when it is larger.
///
/// # Errors
///
/// [`JobError::InvalidRequest`] if the target is smaller than the source.
pub fn copy_partition(
    source: &SharedPartition,
    target: &SharedPartition,
    registry: &FileSystemRegistry,
) -> Result<Operation, JobError> {
    let src = snapshot(source);
    let dst = snapshot(target);
    if dst.capacity() < src.capacity() {
        return Err(JobError::InvalidRequest(format!(
            "{} is too small to hold a copy of {}",
            dst.node, src.node
        )));
    }

    let mut op = Operation::new(
        format!("Copy {} to {}", src.node, dst.node),
        vec![dst.node.clone()],
    )
    .with_job(CheckFileSystemJob::new(source.clone(), registry.clone()))
    .with_job(
        CopyBlocksJob::new(
            CopyEndpoint::path(&src.node, 0, src.capacity()),
            CopyEndpoint::path(&dst.node, 0, src.capacity()),
        )
        .replicating(source.clone(), target.clone()),
    )
    .with_job(CheckFileSystemJob::new(target.clone(), registry.clone()));

    let target_length = dst.length();
    if target_length > src.length() {
        op = op.with_job(
            ResizeFileSystemJob::new(target.clone(), registry.clone(), target_length)
                .from_length(src.length()),
        );
    }
    Ok(op)
}

pub fn deactivate_logical_volumes(device: &Device, lv_paths: Vec<String>) -> Operation {
    let targets = if lv_paths.is_empty() {
        vec![device.node.clone()]
    } else {
        lv_paths.clone()
    };
    Operation::new(format!("Deactivate logical volumes on {}", device.node), targets)
        .with_job(DeactivateLogicalVolumeJob::new(device.clone(), lv_paths))
}
