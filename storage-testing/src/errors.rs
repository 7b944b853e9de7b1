// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestingError {
    #[error("scratch device io error for {path:?}: {reason}")]
    ScratchIo { path: PathBuf, reason: String },
    #[error("scratch device range {first}..{end} is outside its {size} bytes")]
    OutOfRange { first: u64, end: u64, size: u64 },
}

pub type Result<T> = std::result::Result<T, TestingError>;
