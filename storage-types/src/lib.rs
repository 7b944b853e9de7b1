// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data models for the COSMIC Ext Storage execution engine
//!
//! These types are shared between the unprivileged engine, the privileged
//! helper service and the test support crate:
//!
//! - **storage-engine**: builds requests, owns the Report tree and geometry
//! - **storage-service**: receives requests over D-Bus and answers with results
//! - **storage-testing**: replays requests in-process without a bus
//!
//! Nothing in here performs I/O.

pub mod auth;
pub mod caller;
pub mod command;
pub mod copy;
pub mod geometry;
pub mod report;
pub mod status;

pub use auth::{AuthorizationResult, AuthorizationState};
pub use caller::CallerInfo;
pub use command::{CommandRequest, CommandResult, NEVER_COMPLETED, OutputMode};
pub use copy::{CopyEndpoint, CopyLocation, DEFAULT_BLOCK_SIZE, MAX_BUFFER_TARGET};
pub use geometry::{Device, DeviceKind, FileSystemKind, Partition};
pub use report::{Report, ReportStatus};
pub use status::{JobStatus, OperationStatus};
