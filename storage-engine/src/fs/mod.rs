// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem drivers
//!
//! One driver per [`FileSystemKind`]. What a driver can do depends on which
//! tools are installed; that is probed once into [`Capabilities`] when the
//! [`FileSystemRegistry`] is built and never re-checked during a run.

mod ext4;
mod minix;
mod unformatted;
mod xfs;

use std::sync::Arc;

use storage_types::FileSystemKind;

use crate::command::CommandChannel;
use crate::error::JobError;
use crate::job::JobContext;

pub use ext4::Ext4;
pub use minix::Minix;
pub use unformatted::Unformatted;
pub use xfs::Xfs;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;
pub const TIB: u64 = 1024 * GIB;
pub const EIB: u64 = 1024 * 1024 * TIB;

/// How an action is carried out, if at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandSupport {
    #[default]
    None,
    /// The engine does it without filesystem tools (e.g. a raw block move)
    Core,
    /// A filesystem-specific tool does it
    FileSystem,
}

impl CommandSupport {
    pub fn is_supported(self) -> bool {
        self != Self::None
    }

    /// `FileSystem` when `found`, `None` otherwise
    pub fn tool(found: bool) -> Self {
        if found { Self::FileSystem } else { Self::None }
    }
}

/// Per-driver support flags, fixed after probing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub get_used: CommandSupport,
    pub get_label: CommandSupport,
    pub set_label: CommandSupport,
    pub create: CommandSupport,
    pub grow: CommandSupport,
    pub shrink: CommandSupport,
    pub moving: CommandSupport,
    pub check: CommandSupport,
    pub copy: CommandSupport,
    pub backup: CommandSupport,
}

/// Answers whether an external tool is installed
pub trait ToolProbe {
    fn has(&self, tool: &str) -> bool;
}

/// Looks tools up in `PATH` and the system sbin directories
#[derive(Debug, Clone, Copy, Default)]
pub struct PathProbe;

impl ToolProbe for PathProbe {
    fn has(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
            || ["/sbin", "/usr/sbin", "/usr/local/sbin"]
                .iter()
                .any(|dir| std::path::Path::new(dir).join(tool).is_file())
    }
}

impl<F> ToolProbe for F
where
    F: Fn(&str) -> bool,
{
    fn has(&self, tool: &str) -> bool {
        self(tool)
    }
}

/// Package providing a driver's tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportTool {
    pub name: &'static str,
    pub url: &'static str,
}

pub trait FileSystem: Send + Sync {
    fn kind(&self) -> FileSystemKind;

    fn capabilities(&self) -> &Capabilities;

    fn min_capacity(&self) -> u64 {
        0
    }

    fn max_capacity(&self) -> u64 {
        EIB
    }

    fn max_label_length(&self) -> usize {
        16
    }

    fn support_tool(&self) -> Option<SupportTool> {
        None
    }

    /// Whether every tool the driver knows about was found
    fn support_tool_found(&self) -> bool {
        false
    }

    fn check(&self, _ctx: &mut JobContext<'_>, _device: &str) -> Result<(), JobError> {
        Err(self.unsupported("Checking"))
    }

    fn create(&self, _ctx: &mut JobContext<'_>, _device: &str) -> Result<(), JobError> {
        Err(self.unsupported("Creating"))
    }

    /// Resize the filesystem on `device` to `length` bytes
    fn resize(&self, _ctx: &mut JobContext<'_>, _device: &str, _length: u64) -> Result<(), JobError> {
        Err(self.unsupported("Resizing"))
    }

    fn write_label(
        &self,
        _ctx: &mut JobContext<'_>,
        _device: &str,
        _label: &str,
    ) -> Result<(), JobError> {
        Err(self.unsupported("Setting the label"))
    }

    /// Bytes in use, when the installed tools can tell
    fn read_used_capacity(&self, _channel: &CommandChannel, _device: &str) -> Option<u64> {
        None
    }

    fn unsupported(&self, operation: &'static str) -> JobError {
        JobError::Unsupported {
            operation,
            file_system: self.kind(),
        }
    }
}

/// The probed driver for every known filesystem kind
#[derive(Clone)]
pub struct FileSystemRegistry {
    unformatted: Arc<Unformatted>,
    ext4: Arc<Ext4>,
    xfs: Arc<Xfs>,
    minix: Arc<Minix>,
}

impl FileSystemRegistry {
    pub fn probe(probe: &dyn ToolProbe) -> Self {
        let registry = Self {
            unformatted: Arc::new(Unformatted::new()),
            ext4: Arc::new(Ext4::probe(probe)),
            xfs: Arc::new(Xfs::probe(probe)),
            minix: Arc::new(Minix::probe(probe)),
        };

        for kind in FileSystemKind::ALL {
            let fs = registry.get(kind);
            if !fs.support_tool_found()
                && let Some(tool) = fs.support_tool()
            {
                tracing::info!("Support for {} is limited, install {} ({})", kind, tool.name, tool.url);
            }
        }

        registry
    }

    /// Probe the tools installed on this system
    pub fn detect() -> Self {
        Self::probe(&PathProbe)
    }

    pub fn get(&self, kind: FileSystemKind) -> Arc<dyn FileSystem> {
        match kind {
            FileSystemKind::Unformatted => self.unformatted.clone(),
            FileSystemKind::Ext4 => self.ext4.clone(),
            FileSystemKind::Xfs => self.xfs.clone(),
            FileSystemKind::Minix => self.minix.clone(),
        }
    }
}

impl std::fmt::Debug for FileSystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in FileSystemKind::ALL {
            map.entry(&kind.name(), self.get(kind).capabilities());
        }
        map.finish()
    }
}

/// Value of the first `key<sep>value` line, trimmed
pub(crate) fn field<'a>(output: &'a str, key: &str, sep: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (k, v) = line.split_once(sep)?;
        (k.trim() == key).then(|| v.trim())
    })
}

pub(crate) fn numeric_field(output: &str, key: &str, sep: &str) -> Option<u64> {
    field(output, key, sep)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_installed_leaves_only_core_support() {
        let registry = FileSystemRegistry::probe(&|_: &str| false);

        let xfs = registry.get(FileSystemKind::Xfs);
        assert!(!xfs.capabilities().check.is_supported());
        assert!(!xfs.capabilities().create.is_supported());
        assert_eq!(xfs.capabilities().get_label, CommandSupport::Core);
        assert!(!xfs.support_tool_found());

        let unformatted = registry.get(FileSystemKind::Unformatted);
        assert_eq!(unformatted.capabilities().create, CommandSupport::Core);
    }

    #[test]
    fn probed_tools_enable_actions() {
        let registry = FileSystemRegistry::probe(&|tool: &str| tool.starts_with("mkfs."));

        for kind in [FileSystemKind::Ext4, FileSystemKind::Xfs, FileSystemKind::Minix] {
            let fs = registry.get(kind);
            assert_eq!(fs.kind(), kind);
            assert_eq!(fs.capabilities().create, CommandSupport::FileSystem, "{kind}");
            assert!(!fs.capabilities().check.is_supported(), "{kind}");
        }
    }

    #[test]
    fn fields_are_looked_up_by_key() {
        let output = "Block count:              262144\nBlock size:               4096\n";
        assert_eq!(numeric_field(output, "Block count", ":"), Some(262144));
        assert_eq!(numeric_field(output, "Block size", ":"), Some(4096));
        assert_eq!(numeric_field(output, "Free blocks", ":"), None);
    }
}
