// SPDX-License-Identifier: GPL-3.0-only

//! Caller identity information
//!
//! Used on both sides of the helper channel: the engine describes itself to the
//! policy service with it, and the helper builds one from each D-Bus message
//! header before checking authorization.

use serde::{Deserialize, Serialize};

/// Identity of a process asking for privileged work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    /// Unix user ID of the calling process
    pub uid: u32,

    /// Process ID, the subject polkit decides on
    pub pid: u32,

    /// Username resolved from UID
    ///
    /// This is `None` if the username lookup failed, but the UID is always available.
    pub username: Option<String>,

    /// D-Bus unique bus name of the caller (e.g., ":1.42"), empty when not on a bus
    pub sender: String,
}

impl CallerInfo {
    pub fn new(uid: u32, pid: u32, username: Option<String>, sender: String) -> Self {
        Self {
            uid,
            pid,
            username,
            sender,
        }
    }

    /// Check if this caller is root (UID 0)
    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}
