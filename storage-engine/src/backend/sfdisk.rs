// SPDX-License-Identifier: GPL-3.0-only

//! Partition table editing through util-linux `sfdisk`

use storage_types::{CommandRequest, Device, Partition};

use super::{BackendDevice, BackendPartitionTable, PartitionTableBackend};
use crate::error::JobError;
use crate::job::JobContext;

#[derive(Debug, Clone, Copy, Default)]
pub struct SfdiskBackend;

impl SfdiskBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PartitionTableBackend for SfdiskBackend {
    fn open_device(
        &self,
        ctx: &mut JobContext<'_>,
        device: &Device,
    ) -> Option<Box<dyn BackendDevice>> {
        let dump = ctx.run(CommandRequest::new("sfdisk", ["--dump", device.node.as_str()]));
        if !dump.succeeded() {
            tracing::warn!("Could not read the partition table of {}", device.node);
            return None;
        }

        Some(Box::new(SfdiskDevice {
            node: device.node.clone(),
            table_type: table_type(&dump.output()),
        }))
    }
}

struct SfdiskDevice {
    node: String,
    table_type: Option<String>,
}

impl BackendDevice for SfdiskDevice {
    fn node(&self) -> &str {
        &self.node
    }

    fn open_partition_table(&mut self) -> Option<Box<dyn BackendPartitionTable>> {
        let table_type = self.table_type.clone()?;
        Some(Box::new(SfdiskPartitionTable {
            node: self.node.clone(),
            table_type,
        }))
    }
}

struct SfdiskPartitionTable {
    node: String,
    table_type: String,
}

impl BackendPartitionTable for SfdiskPartitionTable {
    fn update_geometry(
        &mut self,
        ctx: &mut JobContext<'_>,
        partition: &Partition,
        first: u64,
        last: u64,
    ) -> Result<(), JobError> {
        if last < first {
            return Err(JobError::PartitionTable(format!(
                "invalid geometry {first}..{last} for {}",
                partition.node
            )));
        }

        let number = partition.number.to_string();
        let script = format!("{},{}\n", first, last - first + 1);
        let request = CommandRequest::new(
            "sfdisk",
            ["--force", "--no-reread", "-N", number.as_str(), self.node.as_str()],
        )
        .with_input(script.into_bytes());

        let result = ctx.run(request);
        if result.succeeded() {
            Ok(())
        } else {
            Err(JobError::PartitionTable(format!(
                "could not set geometry of partition {} on {}",
                partition.node, self.node
            )))
        }
    }

    fn set_partition_label(
        &mut self,
        ctx: &mut JobContext<'_>,
        partition: &Partition,
        label: &str,
    ) -> Result<(), JobError> {
        if self.table_type != "gpt" {
            return Err(JobError::PartitionTable(format!(
                "{} partition tables have no partition names",
                self.table_type
            )));
        }

        let number = partition.number.to_string();
        ctx.run_checked(CommandRequest::new(
            "sfdisk",
            ["--part-label", self.node.as_str(), number.as_str(), label],
        ))?;
        Ok(())
    }

    fn commit(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        let result = ctx.run(CommandRequest::new("partx", ["--update", self.node.as_str()]));
        if result.succeeded() {
            Ok(())
        } else {
            Err(JobError::PartitionTable(format!(
                "the kernel did not pick up the new partition table of {}",
                self.node
            )))
        }
    }
}

/// `label:` line of an `sfdisk --dump`
fn table_type(dump: &str) -> Option<String> {
    crate::fs::field(dump, "label", ":").map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_type_comes_from_the_dump_header() {
        let dump = "label: gpt\nlabel-id: 1C2A\ndevice: /dev/sda\nunit: sectors\n\n/dev/sda1 : start=2048, size=2048\n";
        assert_eq!(table_type(dump).as_deref(), Some("gpt"));
        assert_eq!(table_type("unit: sectors\n"), None);
    }
}
