// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{CommandRequest, Device};

use crate::error::JobError;
use crate::job::{Job, JobContext};

/// Deactivate logical volumes before their volume group is changed
///
/// Without explicit volumes every volume of the group is deactivated.
pub struct DeactivateLogicalVolumeJob {
    device: Device,
    lv_paths: Vec<String>,
}

impl DeactivateLogicalVolumeJob {
    pub fn new(device: Device, lv_paths: Vec<String>) -> Self {
        Self { device, lv_paths }
    }

    fn volume_group(&self) -> &str {
        self.device
            .node
            .strip_prefix("/dev/")
            .unwrap_or(&self.device.node)
    }
}

impl Job for DeactivateLogicalVolumeJob {
    fn description(&self) -> String {
        format!("Deactivate Logical Volume {}", self.device.node)
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        if self.lv_paths.is_empty() {
            let vg = self.volume_group().to_string();
            ctx.run_checked(CommandRequest::new(
                "lvm",
                ["vgchange", "--activate", "n", vg.as_str()],
            ))?;
            return Ok(());
        }

        for lv in &self.lv_paths {
            ctx.run_checked(CommandRequest::new(
                "lvm",
                ["lvchange", "--activate", "n", lv.as_str()],
            ))?;
        }
        Ok(())
    }
}
