// SPDX-License-Identifier: GPL-3.0-only

//! Devices and partitions as seen by the engine

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Disk,
    SoftwareRaid,
    Lvm,
}

/// Closed set of filesystem types the engine knows drivers for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSystemKind {
    #[default]
    Unformatted,
    Ext4,
    Xfs,
    Minix,
}

impl FileSystemKind {
    pub const ALL: [FileSystemKind; 4] = [
        FileSystemKind::Unformatted,
        FileSystemKind::Ext4,
        FileSystemKind::Xfs,
        FileSystemKind::Minix,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Unformatted => "unformatted",
            Self::Ext4 => "ext4",
            Self::Xfs => "xfs",
            Self::Minix => "minix",
        }
    }
}

impl std::fmt::Display for FileSystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A block device holding a partition table (or an LVM volume group)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub node: String,
    pub kind: DeviceKind,
    pub logical_sector_size: u64,
    pub total_sectors: u64,
}

impl Device {
    pub fn new(node: impl Into<String>, kind: DeviceKind, total_sectors: u64) -> Self {
        Self {
            node: node.into(),
            kind,
            logical_sector_size: 512,
            total_sectors,
        }
    }
}

/// A partition's geometry and contents
///
/// Sectors are inclusive on both ends, matching partition table conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub node: String,
    /// Partition number in the table (1-based)
    pub number: u32,
    pub first_sector: u64,
    pub last_sector: u64,
    pub sector_size: u64,
    pub label: String,
    pub file_system: FileSystemKind,
    pub file_system_label: String,
    /// Logical volume path when the partition lives on an LVM device
    pub lv_path: Option<String>,
}

impl Partition {
    pub fn new(node: impl Into<String>, number: u32, first_sector: u64, last_sector: u64) -> Self {
        Self {
            node: node.into(),
            number,
            first_sector,
            last_sector,
            sector_size: 512,
            label: String::new(),
            file_system: FileSystemKind::Unformatted,
            file_system_label: String::new(),
            lv_path: None,
        }
    }

    pub fn with_file_system(mut self, kind: FileSystemKind) -> Self {
        self.file_system = kind;
        self
    }

    pub fn length(&self) -> u64 {
        self.last_sector - self.first_sector + 1
    }

    pub fn capacity(&self) -> u64 {
        self.length() * self.sector_size
    }

    pub fn first_byte(&self) -> u64 {
        self.first_sector * self.sector_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_is_inclusive() {
        let p = Partition::new("/dev/sda1", 1, 2048, 4095);
        assert_eq!(p.length(), 2048);
        assert_eq!(p.capacity(), 2048 * 512);
        assert_eq!(p.first_byte(), 2048 * 512);
    }
}
