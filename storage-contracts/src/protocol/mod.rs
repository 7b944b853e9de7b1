// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod events;
pub mod helper;
pub mod id;

pub use error::ChannelError;
pub use events::{RunEvent, RunOutcome};
pub use helper::{ACTION_ID, HELPER_BUS_NAME, HELPER_INTERFACE, HELPER_OBJECT_PATH};
pub use id::OperationId;
