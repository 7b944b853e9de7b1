// SPDX-License-Identifier: GPL-3.0-only

pub mod authority;
pub mod automount;
pub mod transport;

pub use authority::PolicyAuthority;
pub use automount::{AutomountControl, NoAutomount};
pub use transport::{CopyReply, HelperTransport, ReadyWaiter};
