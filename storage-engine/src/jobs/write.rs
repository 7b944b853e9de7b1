// SPDX-License-Identifier: GPL-3.0-only

use crate::error::JobError;
use crate::job::{Job, JobContext};

/// Write a buffer to a device at a byte offset
pub struct WriteDataJob {
    buffer: Vec<u8>,
    device: String,
    first_byte: u64,
}

impl WriteDataJob {
    pub fn new(buffer: Vec<u8>, device: impl Into<String>, first_byte: u64) -> Self {
        Self {
            buffer,
            device: device.into(),
            first_byte,
        }
    }
}

impl Job for WriteDataJob {
    fn description(&self) -> String {
        format!(
            "Write {} bytes to {} at byte {}",
            self.buffer.len(),
            self.device,
            self.first_byte
        )
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let result = ctx
            .channel()
            .write_data(&self.buffer, &self.device, self.first_byte);
        ctx.report().set_exit_code(result.exit_code);

        if result.success {
            Ok(())
        } else {
            Err(JobError::Failed(format!(
                "Writing {} bytes to {} failed",
                self.buffer.len(),
                self.device
            )))
        }
    }
}
