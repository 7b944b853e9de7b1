// SPDX-License-Identifier: GPL-3.0-only

//! XFS through xfsprogs
//!
//! XFS only grows, and only while mounted: resizing mounts the filesystem on
//! a temporary directory, runs `xfs_growfs` and unmounts again. A mount point
//! that could not be unmounted is left behind and named in the report.

use storage_types::{CommandRequest, FileSystemKind};

use super::{Capabilities, CommandSupport, EIB, FileSystem, MIB, SupportTool, ToolProbe, numeric_field};
use crate::command::CommandChannel;
use crate::error::JobError;
use crate::job::JobContext;

#[derive(Debug)]
pub struct Xfs {
    capabilities: Capabilities,
}

impl Xfs {
    pub fn probe(probe: &dyn ToolProbe) -> Self {
        let db = CommandSupport::tool(probe.has("xfs_db"));
        let check = CommandSupport::tool(probe.has("xfs_repair"));
        let grow = if probe.has("xfs_growfs") && check.is_supported() {
            CommandSupport::FileSystem
        } else {
            CommandSupport::None
        };

        Self {
            capabilities: Capabilities {
                get_used: db,
                get_label: CommandSupport::Core,
                set_label: db,
                create: CommandSupport::tool(probe.has("mkfs.xfs")),
                grow,
                shrink: CommandSupport::None,
                moving: if check.is_supported() {
                    CommandSupport::Core
                } else {
                    CommandSupport::None
                },
                check,
                copy: CommandSupport::tool(probe.has("xfs_copy")),
                backup: CommandSupport::Core,
            },
        }
    }
}

impl FileSystem for Xfs {
    fn kind(&self) -> FileSystemKind {
        FileSystemKind::Xfs
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn min_capacity(&self) -> u64 {
        32 * MIB
    }

    fn max_capacity(&self) -> u64 {
        EIB
    }

    fn max_label_length(&self) -> usize {
        12
    }

    fn support_tool(&self) -> Option<SupportTool> {
        Some(SupportTool {
            name: "xfsprogs",
            url: "https://xfs.org/index.php/Getting_the_latest_source_code",
        })
    }

    fn support_tool_found(&self) -> bool {
        let c = &self.capabilities;
        [c.get_used, c.set_label, c.create, c.check, c.grow, c.copy, c.moving]
            .iter()
            .all(|s| s.is_supported())
    }

    fn check(&self, ctx: &mut JobContext<'_>, device: &str) -> Result<(), JobError> {
        ctx.run_checked(CommandRequest::new("xfs_repair", ["-v", device]))?;
        Ok(())
    }

    fn create(&self, ctx: &mut JobContext<'_>, device: &str) -> Result<(), JobError> {
        ctx.run_checked(CommandRequest::new("mkfs.xfs", ["-f", device]))?;
        Ok(())
    }

    fn resize(&self, ctx: &mut JobContext<'_>, device: &str, _length: u64) -> Result<(), JobError> {
        let mount_point = tempfile::Builder::new()
            .prefix("cosmic-ext-storage-xfs-")
            .tempdir()
            .map_err(|e| {
                JobError::Failed(format!(
                    "Resizing XFS file system on {device} failed: could not create a temporary directory: {e}"
                ))
            })?;
        let dir = mount_point.path().to_string_lossy().into_owned();

        let mounted = ctx.run(CommandRequest::new(
            "mount",
            ["--verbose", "--types", "xfs", device, dir.as_str()],
        ));
        if !mounted.succeeded() {
            return Err(JobError::Failed(format!(
                "Resizing XFS file system on {device} failed: initial mount failed"
            )));
        }

        let grown = ctx.run(CommandRequest::new("xfs_growfs", [dir.as_str()]));

        let unmounted = ctx.run(CommandRequest::new("umount", [dir.as_str()]));
        if !unmounted.succeeded() {
            // Still mounted: dropping the TempDir would delete the filesystem's contents
            let kept = mount_point.keep();
            tracing::warn!("Unmounting {} from {} failed, leaving the mount point in place", device, kept.display());
            ctx.report().line(format!(
                "Warning: unmounting {device} after resizing failed; it is still mounted on {}",
                kept.display()
            ));
        }

        if grown.succeeded() {
            Ok(())
        } else {
            Err(JobError::Failed(format!(
                "Resizing XFS file system on {device} failed: xfs_growfs failed"
            )))
        }
    }

    fn write_label(&self, ctx: &mut JobContext<'_>, device: &str, label: &str) -> Result<(), JobError> {
        let set = format!("label {label}");
        ctx.run_checked(CommandRequest::new(
            "xfs_db",
            ["-x", "-c", "sb 0", "-c", set.as_str(), device],
        ))?;
        Ok(())
    }

    fn read_used_capacity(&self, channel: &CommandChannel, device: &str) -> Option<u64> {
        let result = channel.run(
            None,
            CommandRequest::new("xfs_db", ["-c", "sb 0", "-c", "print", device]),
        );
        if !result.succeeded() {
            return None;
        }
        used_from_superblock(&result.output())
    }
}

fn used_from_superblock(output: &str) -> Option<u64> {
    let blocks = numeric_field(output, "dblocks", "=")?;
    let block_size = numeric_field(output, "blocksize", "=")?;
    let free = numeric_field(output, "fdblocks", "=")?;
    Some(blocks.saturating_sub(free) * block_size)
}
