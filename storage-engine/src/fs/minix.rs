// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{CommandRequest, FileSystemKind};

use super::{Capabilities, CommandSupport, FileSystem, GIB, SupportTool, ToolProbe};
use crate::error::JobError;
use crate::job::JobContext;

#[derive(Debug)]
pub struct Minix {
    capabilities: Capabilities,
}

impl Minix {
    pub fn probe(probe: &dyn ToolProbe) -> Self {
        let check = CommandSupport::tool(probe.has("fsck.minix"));
        let core_if_checked = if check.is_supported() {
            CommandSupport::Core
        } else {
            CommandSupport::None
        };

        Self {
            capabilities: Capabilities {
                get_label: CommandSupport::Core,
                create: CommandSupport::tool(probe.has("mkfs.minix")),
                moving: core_if_checked,
                copy: core_if_checked,
                check,
                backup: CommandSupport::Core,
                ..Capabilities::default()
            },
        }
    }
}

impl FileSystem for Minix {
    fn kind(&self) -> FileSystemKind {
        FileSystemKind::Minix
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn max_capacity(&self) -> u64 {
        4 * GIB
    }

    fn max_label_length(&self) -> usize {
        63
    }

    fn support_tool(&self) -> Option<SupportTool> {
        Some(SupportTool {
            name: "util-linux",
            url: "https://www.kernel.org/pub/linux/utils/util-linux/",
        })
    }

    fn support_tool_found(&self) -> bool {
        self.capabilities.create.is_supported() && self.capabilities.check.is_supported()
    }

    fn check(&self, ctx: &mut JobContext<'_>, device: &str) -> Result<(), JobError> {
        ctx.run_checked(CommandRequest::new("fsck.minix", [device]))?;
        Ok(())
    }

    fn create(&self, ctx: &mut JobContext<'_>, device: &str) -> Result<(), JobError> {
        ctx.run_checked(CommandRequest::new("mkfs.minix", ["-3", device]))?;
        Ok(())
    }
}
