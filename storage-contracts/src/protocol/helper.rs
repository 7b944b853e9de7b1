// SPDX-License-Identifier: GPL-3.0-only

//! Wire constants of the privileged helper

/// Well-known bus name the helper owns while it is running
pub const HELPER_BUS_NAME: &str = "org.cosmic.ext.Storage.Helper";

/// Object path the helper interface is exported at
pub const HELPER_OBJECT_PATH: &str = "/org/cosmic/ext/Storage/Helper";

/// Interface name of the helper
pub const HELPER_INTERFACE: &str = "org.cosmic.ext.Storage.Helper";

/// Polkit action a caller must hold to use the helper
pub const ACTION_ID: &str = "org.cosmic.ext.storage-helper.init";
