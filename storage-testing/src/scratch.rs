// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::errors::{Result, TestingError};

/// A temporary file that plays a block device in tests
pub struct ScratchDevice {
    file: NamedTempFile,
    size: u64,
}

impl ScratchDevice {
    /// Create a device of `size` bytes filled with zeros
    pub fn zeroed(size: u64) -> Result<Self> {
        Self::with_content(&vec![0u8; size as usize])
    }

    /// Create a device whose bytes follow a repeating non-zero pattern
    pub fn patterned(size: u64) -> Result<Self> {
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8 + 1).collect();
        Self::with_content(&data)
    }

    fn with_content(data: &[u8]) -> Result<Self> {
        let mut file = NamedTempFile::new().map_err(|e| TestingError::ScratchIo {
            path: std::env::temp_dir(),
            reason: e.to_string(),
        })?;
        let path = file.path().to_path_buf();
        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|e| TestingError::ScratchIo {
                path,
                reason: e.to_string(),
            })?;
        Ok(Self {
            file,
            size: data.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Device node string as a Job would receive it
    pub fn node(&self) -> String {
        self.file.path().to_string_lossy().into_owned()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read back `length` bytes starting at `first`
    pub fn read(&self, first: u64, length: u64) -> Result<Vec<u8>> {
        let end = first + length;
        if end > self.size {
            return Err(TestingError::OutOfRange {
                first,
                end,
                size: self.size,
            });
        }
        let content = fs::read(self.path()).map_err(|e| TestingError::ScratchIo {
            path: self.path().to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(content[first as usize..end as usize].to_vec())
    }
}
