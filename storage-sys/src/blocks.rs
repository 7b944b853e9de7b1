// SPDX-License-Identifier: GPL-3.0-only

//! Raw block copies and buffer writes using positioned file I/O
//!
//! Data is moved in fixed-size blocks so the helper's memory footprint stays
//! bounded by the block size, whatever the length of the copy.

use std::fs::{File, OpenOptions};
use std::ops::ControlFlow;
use std::os::unix::fs::FileExt;
use std::path::Path;

use storage_types::{CopyEndpoint, CopyLocation, MAX_BUFFER_TARGET};

use crate::error::{Result, SysError};

/// Progress after each copied block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyProgress {
    pub bytes_copied: u64,
    pub total_bytes: u64,
}

impl CopyProgress {
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.bytes_copied.saturating_mul(100)) / self.total_bytes).min(100) as u8
    }
}

/// Result of a finished copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub bytes_copied: u64,
    /// The target buffer when the target endpoint was in memory
    pub target_data: Option<Vec<u8>>,
}

enum Reader<'a> {
    File(File),
    Buffer(&'a [u8]),
}

impl Reader<'_> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        match self {
            Reader::File(file) => Ok(file.read_exact_at(buf, offset)?),
            Reader::Buffer(data) => {
                let range = buffer_range(offset, buf.len());
                let slice = range.and_then(|r| data.get(r)).ok_or_else(|| {
                    SysError::InvalidArgument(format!(
                        "source range at {offset} (+{}) exceeds buffer of {} bytes",
                        buf.len(),
                        data.len()
                    ))
                })?;
                buf.copy_from_slice(slice);
                Ok(())
            }
        }
    }
}

enum Writer {
    File(File),
    Buffer(Vec<u8>),
}

impl Writer {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        match self {
            Writer::File(file) => Ok(file.write_all_at(buf, offset)?),
            Writer::Buffer(data) => {
                let range = buffer_range(offset, buf.len())
                    .filter(|r| r.end as u64 <= MAX_BUFFER_TARGET)
                    .ok_or_else(|| {
                        SysError::InvalidArgument(format!(
                            "target range at {offset} (+{}) exceeds the in-memory limit of {MAX_BUFFER_TARGET} bytes",
                            buf.len()
                        ))
                    })?;
                let (start, end) = (range.start, range.end);
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(buf);
                Ok(())
            }
        }
    }
}

fn buffer_range(offset: u64, len: usize) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    Some(start..start.checked_add(len)?)
}

fn open_for_read(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| map_open_error(e, path, "reading"))
}

fn open_for_write(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| map_open_error(e, path, "writing"))
}

fn map_open_error(e: std::io::Error, path: &Path, purpose: &str) -> SysError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            SysError::PermissionDenied(format!("Cannot open {} for {}", path.display(), purpose))
        }
        std::io::ErrorKind::NotFound => SysError::DeviceNotFound(path.display().to_string()),
        _ => SysError::Io(e),
    }
}

/// Copy `source.length` bytes from `source` to `target.first_byte` of `target`
///
/// When source and target are the same file and the target range starts inside
/// the source range, blocks are copied back to front so no source byte is
/// overwritten before it has been read.
///
/// `on_block` runs after every block; returning `ControlFlow::Break` aborts the
/// copy with [`SysError::Cancelled`].
pub fn copy_blocks<F>(
    source: &CopyEndpoint,
    target: &CopyEndpoint,
    block_size: u64,
    mut on_block: F,
) -> Result<CopyOutcome>
where
    F: FnMut(CopyProgress) -> ControlFlow<()>,
{
    if block_size == 0 {
        return Err(SysError::InvalidArgument("block size must be positive".to_string()));
    }

    let total = source.length;

    if target.is_buffer() {
        let end = target.first_byte.checked_add(total);
        if end.is_none_or(|end| end > MAX_BUFFER_TARGET) {
            return Err(SysError::InvalidArgument(format!(
                "in-memory target {} bytes at offset {} exceeds the limit of {MAX_BUFFER_TARGET} bytes",
                total, target.first_byte
            )));
        }
    }

    let reader = match &source.location {
        CopyLocation::Path(path) => Reader::File(open_for_read(path)?),
        CopyLocation::Buffer(data) => Reader::Buffer(data),
    };

    let mut writer = match &target.location {
        CopyLocation::Path(path) => Writer::File(open_for_write(path)?),
        CopyLocation::Buffer(data) => Writer::Buffer(data.clone()),
    };

    let backwards = match (&source.location, &target.location) {
        (CopyLocation::Path(s), CopyLocation::Path(t)) => {
            s == t && target.first_byte > source.first_byte && target.first_byte < source.last_byte()
        }
        _ => false,
    };

    tracing::debug!(
        "Copying {} bytes {} -> {} in blocks of {} bytes{}",
        total,
        source.describe(),
        target.describe(),
        block_size,
        if backwards { " (back to front)" } else { "" }
    );

    let mut buffer = vec![0u8; block_size.min(total.max(1)) as usize];
    let mut copied: u64 = 0;

    while copied < total {
        let chunk = block_size.min(total - copied);
        let relative = if backwards { total - copied - chunk } else { copied };

        let buf = &mut buffer[..chunk as usize];
        reader.read_at(buf, source.first_byte + relative)?;
        writer.write_at(buf, target.first_byte + relative)?;

        copied += chunk;

        if on_block(CopyProgress {
            bytes_copied: copied,
            total_bytes: total,
        })
        .is_break()
        {
            tracing::info!("Block copy cancelled after {} of {} bytes", copied, total);
            return Err(SysError::Cancelled);
        }
    }

    let target_data = match writer {
        Writer::File(file) => {
            file.sync_data()?;
            None
        }
        Writer::Buffer(data) => Some(data),
    };

    Ok(CopyOutcome {
        bytes_copied: copied,
        target_data,
    })
}

/// Write `buffer` at `first_byte` of the device or file at `target`
pub fn write_data(buffer: &[u8], target: &Path, first_byte: u64) -> Result<()> {
    let file = open_for_write(target)?;
    file.write_all_at(buffer, first_byte)?;
    file.sync_data()?;
    Ok(())
}
