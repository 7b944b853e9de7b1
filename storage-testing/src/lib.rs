// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles for the engine's outside world
//!
//! - [`LoopbackTransport`] executes helper requests in-process through
//!   `storage-sys`, no bus and no root needed for scratch files
//! - [`ScriptedTransport`] answers from a script and records every request
//! - [`FakeAuthority`] and [`FakeAutomount`] count how often they were used
//! - [`ScratchDevice`] is a temporary file standing in for a block device

pub mod authority;
pub mod automount;
pub mod errors;
pub mod loopback;
pub mod scratch;
pub mod scripted;

pub use authority::FakeAuthority;
pub use automount::FakeAutomount;
pub use errors::{Result, TestingError};
pub use loopback::LoopbackTransport;
pub use scratch::ScratchDevice;
pub use scripted::{ScriptedTransport, TransportCall};
