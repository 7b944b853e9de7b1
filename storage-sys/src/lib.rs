// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for the privileged helper
//!
//! This crate performs the work behind the helper's D-Bus methods:
//! - Running external tools with stdin input and captured output
//! - Copying byte ranges between devices, files and buffers in fixed-size blocks
//! - Writing raw buffers at an offset of a device
//!
//! Everything here is synchronous; callers on an async runtime should use
//! `spawn_blocking`. These operations require elevated privileges when they
//! touch device nodes and should only be called from the helper service.

pub mod blocks;
pub mod command;
pub mod error;

pub use blocks::{CopyOutcome, CopyProgress, copy_blocks, write_data};
pub use command::run_command;
pub use error::{Result, SysError};
