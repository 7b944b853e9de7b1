// SPDX-License-Identifier: GPL-3.0-only

use std::sync::{Arc, Mutex, PoisonError};

use storage_types::{CopyEndpoint, DEFAULT_BLOCK_SIZE, JobStatus};

use super::{SharedPartition, lock, snapshot};
use crate::error::JobError;
use crate::job::{Job, JobContext};

/// Receives the bytes of a copy into memory
pub type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Copy a byte range through the helper, block by block
pub struct CopyBlocksJob {
    source: CopyEndpoint,
    target: CopyEndpoint,
    sink: Option<SharedBuffer>,
    replicate: Option<(SharedPartition, SharedPartition)>,
}

impl CopyBlocksJob {
    pub fn new(source: CopyEndpoint, target: CopyEndpoint) -> Self {
        Self {
            source,
            target,
            sink: None,
            replicate: None,
        }
    }

    /// Store the produced bytes in `sink` when the target is in memory
    pub fn capture_into(mut self, sink: SharedBuffer) -> Self {
        self.sink = Some(sink);
        self
    }

    /// After a successful copy, `to` carries the filesystem of `from`
    pub fn replicating(mut self, from: SharedPartition, to: SharedPartition) -> Self {
        self.replicate = Some((from, to));
        self
    }
}

impl Job for CopyBlocksJob {
    fn description(&self) -> String {
        format!(
            "Copy {} bytes from {} to {}",
            self.source.length,
            self.source.describe(),
            self.target.describe()
        )
    }

    fn num_steps(&self) -> u32 {
        u32::try_from(self.source.length.div_ceil(DEFAULT_BLOCK_SIZE)).unwrap_or(u32::MAX).max(1)
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let (report, channel, progress) = ctx.parts();
        let copied = channel.copy_blocks(Some(report), &self.source, &self.target, progress);

        if !copied.result.success {
            return Err(JobError::CopyFailed {
                source_range: self.source.describe(),
                target_range: self.target.describe(),
            });
        }

        if let (Some(sink), Some(data)) = (&self.sink, copied.target_data) {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = data;
        }
        Ok(())
    }

    fn preview(&mut self, status: JobStatus) {
        if status != JobStatus::Success {
            return;
        }
        if let Some((from, to)) = &self.replicate {
            let source = snapshot(from);
            let mut target = lock(to);
            target.file_system = source.file_system;
            target.file_system_label = source.file_system_label;
        }
    }
}
