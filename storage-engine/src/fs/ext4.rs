// SPDX-License-Identifier: GPL-3.0-only

//! ext4 through e2fsprogs

use storage_types::{CommandRequest, FileSystemKind};

use super::{Capabilities, CommandSupport, EIB, FileSystem, KIB, SupportTool, ToolProbe, numeric_field};
use crate::command::CommandChannel;
use crate::error::JobError;
use crate::job::JobContext;

#[derive(Debug)]
pub struct Ext4 {
    capabilities: Capabilities,
}

impl Ext4 {
    pub fn probe(probe: &dyn ToolProbe) -> Self {
        let check = CommandSupport::tool(probe.has("e2fsck"));
        let resize = if probe.has("resize2fs") && check.is_supported() {
            CommandSupport::FileSystem
        } else {
            CommandSupport::None
        };
        let label = CommandSupport::tool(probe.has("e2label"));

        Self {
            capabilities: Capabilities {
                get_used: CommandSupport::tool(probe.has("dumpe2fs")),
                get_label: CommandSupport::Core,
                set_label: label,
                create: CommandSupport::tool(probe.has("mkfs.ext4")),
                grow: resize,
                shrink: resize,
                moving: if check.is_supported() {
                    CommandSupport::Core
                } else {
                    CommandSupport::None
                },
                check,
                copy: if check.is_supported() {
                    CommandSupport::Core
                } else {
                    CommandSupport::None
                },
                backup: CommandSupport::Core,
            },
        }
    }
}

impl FileSystem for Ext4 {
    fn kind(&self) -> FileSystemKind {
        FileSystemKind::Ext4
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn max_capacity(&self) -> u64 {
        EIB
    }

    fn max_label_length(&self) -> usize {
        16
    }

    fn support_tool(&self) -> Option<SupportTool> {
        Some(SupportTool {
            name: "e2fsprogs",
            url: "https://e2fsprogs.sourceforge.net",
        })
    }

    fn support_tool_found(&self) -> bool {
        let c = &self.capabilities;
        [c.get_used, c.set_label, c.create, c.grow, c.check]
            .iter()
            .all(|s| s.is_supported())
    }

    fn check(&self, ctx: &mut JobContext<'_>, device: &str) -> Result<(), JobError> {
        let result = ctx.run(CommandRequest::new("e2fsck", ["-f", "-y", "-v", device]));
        // 1: errors corrected, 2: corrected and a reboot is advised
        if result.success && (0..=2).contains(&result.exit_code) {
            Ok(())
        } else {
            Err(JobError::CommandFailed {
                command: "e2fsck".to_string(),
                exit_code: result.exit_code,
            })
        }
    }

    fn create(&self, ctx: &mut JobContext<'_>, device: &str) -> Result<(), JobError> {
        ctx.run_checked(CommandRequest::new("mkfs.ext4", ["-qF", device]))?;
        Ok(())
    }

    fn resize(&self, ctx: &mut JobContext<'_>, device: &str, length: u64) -> Result<(), JobError> {
        let size = format!("{}K", length / KIB);
        ctx.run_checked(CommandRequest::new("resize2fs", [device, size.as_str()]))?;
        Ok(())
    }

    fn write_label(&self, ctx: &mut JobContext<'_>, device: &str, label: &str) -> Result<(), JobError> {
        ctx.run_checked(CommandRequest::new("e2label", [device, label]))?;
        Ok(())
    }

    fn read_used_capacity(&self, channel: &CommandChannel, device: &str) -> Option<u64> {
        let result = channel.run(None, CommandRequest::new("dumpe2fs", ["-h", device]));
        if !result.succeeded() {
            return None;
        }
        used_from_dumpe2fs(&result.output())
    }
}

fn used_from_dumpe2fs(output: &str) -> Option<u64> {
    let count = numeric_field(output, "Block count", ":")?;
    let free = numeric_field(output, "Free blocks", ":")?;
    let size = numeric_field(output, "Block size", ":")?;
    Some(count.saturating_sub(free) * size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_capacity_from_superblock_summary() {
        let output = "\
Filesystem volume name:   <none>
Block count:              262144
Reserved block count:     13107
Free blocks:              249189
Block size:               4096
";
        assert_eq!(used_from_dumpe2fs(output), Some((262144 - 249189) * 4096));
    }

    #[test]
    fn incomplete_summary_is_unknown() {
        assert_eq!(used_from_dumpe2fs("Block count: 10\n"), None);
    }
}
