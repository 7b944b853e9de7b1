// SPDX-License-Identifier: GPL-3.0-only

//! Contracts between the execution engine and the world around it
//!
//! The engine only talks to the privileged helper, the policy-decision
//! service and the desktop automounter through the traits in [`traits`].
//! [`client`] carries the D-Bus implementations used in production.

pub mod client;
pub mod protocol;
pub mod traits;

pub use protocol::{
    ACTION_ID, ChannelError, HELPER_BUS_NAME, HELPER_INTERFACE, HELPER_OBJECT_PATH, OperationId,
    RunEvent, RunOutcome,
};
pub use traits::{
    AutomountControl, CopyReply, HelperTransport, NoAutomount, PolicyAuthority, ReadyWaiter,
};
