// SPDX-License-Identifier: GPL-3.0-only

//! Copy endpoints for raw block copies

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bytes moved per block by the helper (10 MiB)
pub const DEFAULT_BLOCK_SIZE: u64 = 10 * 1024 * 1024;

/// Largest in-memory target the helper will grow (256 MiB), offset included
pub const MAX_BUFFER_TARGET: u64 = 256 * 1024 * 1024;

/// Where the bytes of an endpoint live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyLocation {
    /// Device node or regular file
    Path(PathBuf),
    /// In-memory buffer
    ///
    /// As a target the buffer must start out empty: the helper never receives
    /// its contents, so the produced bytes always land in a fresh zero-filled
    /// buffer of `first_byte + length` bytes.
    Buffer(Vec<u8>),
}

/// A byte range on a device, file or buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyEndpoint {
    pub location: CopyLocation,
    pub first_byte: u64,
    pub length: u64,
}

impl CopyEndpoint {
    pub fn path(path: impl Into<PathBuf>, first_byte: u64, length: u64) -> Self {
        Self {
            location: CopyLocation::Path(path.into()),
            first_byte,
            length,
        }
    }

    /// Source endpoint covering a whole in-memory buffer
    pub fn buffer(data: Vec<u8>) -> Self {
        let length = data.len() as u64;
        Self {
            location: CopyLocation::Buffer(data),
            first_byte: 0,
            length,
        }
    }

    /// Empty in-memory target; the copied bytes land at `first_byte`
    pub fn buffer_target(first_byte: u64) -> Self {
        Self {
            location: CopyLocation::Buffer(Vec::new()),
            first_byte,
            length: 0,
        }
    }

    /// Exclusive end of the range
    pub fn last_byte(&self) -> u64 {
        self.first_byte.saturating_add(self.length)
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.location, CopyLocation::Buffer(_))
    }

    /// Path as a string, empty for buffers (the helper wire convention)
    pub fn wire_path(&self) -> String {
        match &self.location {
            CopyLocation::Path(p) => p.to_string_lossy().into_owned(),
            CopyLocation::Buffer(_) => String::new(),
        }
    }

    /// Whether this is an in-memory target that already carries bytes
    pub fn is_prefilled_buffer(&self) -> bool {
        self.buffer_data().is_some_and(|data| !data.is_empty())
    }

    pub fn buffer_data(&self) -> Option<&[u8]> {
        match &self.location {
            CopyLocation::Buffer(data) => Some(data),
            CopyLocation::Path(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.location {
            CopyLocation::Path(p) => format!(
                "{} [{}..{})",
                p.display(),
                self.first_byte,
                self.last_byte()
            ),
            CopyLocation::Buffer(_) => {
                format!("<buffer> [{}..{})", self.first_byte, self.last_byte())
            }
        }
    }
}
