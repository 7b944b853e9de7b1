// SPDX-License-Identifier: GPL-3.0-only

use storage_types::FileSystemKind;

use super::{Capabilities, CommandSupport, FileSystem};
use crate::error::JobError;
use crate::job::JobContext;

/// Space without a filesystem; creating one is a no-op
#[derive(Debug)]
pub struct Unformatted {
    capabilities: Capabilities,
}

impl Unformatted {
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities {
                create: CommandSupport::Core,
                grow: CommandSupport::Core,
                shrink: CommandSupport::Core,
                moving: CommandSupport::Core,
                ..Capabilities::default()
            },
        }
    }
}

impl Default for Unformatted {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for Unformatted {
    fn kind(&self) -> FileSystemKind {
        FileSystemKind::Unformatted
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn max_label_length(&self) -> usize {
        0
    }

    fn support_tool_found(&self) -> bool {
        true
    }

    fn create(&self, _ctx: &mut JobContext<'_>, _device: &str) -> Result<(), JobError> {
        Ok(())
    }

    fn resize(&self, _ctx: &mut JobContext<'_>, _device: &str, _length: u64) -> Result<(), JobError> {
        Ok(())
    }
}
