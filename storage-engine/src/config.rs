// SPDX-License-Identifier: GPL-3.0-only

//! Engine configuration
//!
//! Read from `$XDG_CONFIG_HOME/cosmic-ext-storage/engine.toml`, or from the
//! file named by `COSMIC_EXT_STORAGE_CONFIG`. Every field has a default, so a
//! missing file or a partial one is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use storage_contracts::{ACTION_ID, HELPER_BUS_NAME, HELPER_OBJECT_PATH};
use storage_types::DEFAULT_BLOCK_SIZE;

const CONFIG_ENV: &str = "COSMIC_EXT_STORAGE_CONFIG";
const CONFIG_DIR: &str = "cosmic-ext-storage";
const CONFIG_FILE: &str = "engine.toml";

/// Ten days: wait for a privileged command as long as it takes, but not forever
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10 * 24 * 60 * 60;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Which desktop automounter to silence during a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomountBackend {
    #[default]
    Kded,
    None,
}

/// What to do when another process already owns the helper
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingHelperPolicy {
    /// Log and terminate this process; the other instance keeps the helper
    #[default]
    Exit,
    /// Fail every privileged request of this process
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub helper_bus_name: String,
    pub helper_object_path: String,
    pub action_id: String,
    /// Talk to a helper on the session bus (development)
    pub session_bus: bool,
    pub command_timeout_secs: u64,
    /// How long to wait for a freshly started helper to announce itself
    pub helper_start_timeout_secs: u64,
    /// Searched when a command is not on `PATH`
    pub privileged_search_dirs: Vec<PathBuf>,
    pub block_size: u64,
    pub automount: AutomountBackend,
    pub existing_helper: ExistingHelperPolicy,
    /// Refuse privileged requests locally when authorization was denied
    pub fail_closed: bool,
    pub log_level: LoggingLevel,
    pub log_to_disk: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            helper_bus_name: HELPER_BUS_NAME.to_string(),
            helper_object_path: HELPER_OBJECT_PATH.to_string(),
            action_id: ACTION_ID.to_string(),
            session_bus: false,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            helper_start_timeout_secs: 120,
            privileged_search_dirs: ["/sbin", "/usr/sbin", "/usr/local/sbin"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            block_size: DEFAULT_BLOCK_SIZE,
            automount: AutomountBackend::default(),
            existing_helper: ExistingHelperPolicy::default(),
            fail_closed: false,
            log_level: LoggingLevel::Info,
            log_to_disk: true,
        }
    }
}

impl EngineConfig {
    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> anyhow::Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        anyhow::ensure!(config.block_size > 0, "block_size must be positive");
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(dir).join(CONFIG_DIR).join(CONFIG_FILE));
        }
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join(CONFIG_DIR)
                .join(CONFIG_FILE)
        })
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn helper_start_timeout(&self) -> Duration {
        Duration::from_secs(self.helper_start_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_helper_wire_names() {
        let config = EngineConfig::default();
        assert_eq!(config.helper_bus_name, "org.cosmic.ext.Storage.Helper");
        assert_eq!(config.command_timeout(), Duration::from_secs(864_000));
        assert_eq!(config.block_size, 10 * 1024 * 1024);
        assert!(!config.fail_closed);
        assert_eq!(config.existing_helper, ExistingHelperPolicy::Exit);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = EngineConfig::parse(
            r#"
            fail_closed = true
            automount = "none"
            existing_helper = "fail"
            log_level = "debug"
            "#,
        )
        .expect("parse");
        assert!(config.fail_closed);
        assert_eq!(config.automount, AutomountBackend::None);
        assert_eq!(config.existing_helper, ExistingHelperPolicy::Fail);
        assert_eq!(config.log_level.as_directive(), "debug");
        assert_eq!(config.privileged_search_dirs.len(), 3);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        assert!(EngineConfig::parse("block_size = 0").is_err());
    }

    #[test]
    fn malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"fail_closed = maybe").expect("write");
        let err = EngineConfig::load_from(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));
    }
}
