// SPDX-License-Identifier: GPL-3.0-only

//! D-Bus implementations of the engine's outside-world traits

pub mod automount;
pub mod connection;
pub mod helper;
pub mod polkit;

pub use automount::KdedAutomount;
pub use connection::{BusKind, BusRuntime};
pub use helper::DbusHelperTransport;
pub use polkit::PolkitAuthority;
