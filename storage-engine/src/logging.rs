// SPDX-License-Identifier: GPL-3.0-only

//! Logging for applications embedding the engine
//!
//! Output goes to stdout and, while enabled, to a daily-rolling file under
//! the user's state directory. Dispatched command lines are logged on
//! [`COMMAND_TARGET`]; with [`DEBUG_ENV`] set that target stays at info
//! whatever the configured level, so command echoes survive a `warn` setup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use crate::command::DEBUG_ENV;
use crate::config::{EngineConfig, LoggingLevel};

/// Target of every command echo
pub const COMMAND_TARGET: &str = "storage_engine::command";

const LOG_FILE_ENV: &str = "COSMIC_EXT_STORAGE_LOG_FILE";
const LOG_DIR_ENV: &str = "COSMIC_EXT_STORAGE_LOG_DIR";
const FILE_PREFIX: &str = "cosmic-ext-storage-engine.log";
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static TO_DISK: AtomicBool = AtomicBool::new(true);

/// Filter directive for `level`, keeping command echoes visible when asked for
pub fn directive(level: LoggingLevel, echo_commands: bool) -> String {
    let base = level.as_directive();
    match level {
        LoggingLevel::Error | LoggingLevel::Warn if echo_commands => {
            format!("{base},{COMMAND_TARGET}=info")
        }
        _ => base.to_string(),
    }
}

fn echo_requested() -> bool {
    std::env::var_os(DEBUG_ENV).is_some()
}

/// Install the global subscriber; later calls leave the first one in place
///
/// `RUST_LOG` overrides the configured level.
pub fn init(config: &EngineConfig) {
    TO_DISK.store(config.log_to_disk, Ordering::Relaxed);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(config.log_level, echo_requested())));
    let (filter, handle) = reload::Layer::new(filter);

    let files = LogFiles::from_env();
    let (file_layer, guard) = match files.writer() {
        Ok((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter_fn(|_| TO_DISK.load(Ordering::Relaxed)));
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "cosmic-ext-storage: logging to {} disabled: {e}",
                files.dir.display()
            );
            (None, None)
        }
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        let _ = FILTER.set(handle);
        if let Some(guard) = guard {
            let _ = FILE_GUARD.set(guard);
        }
        tracing::debug!("Logging to {}", files.dir.display());
    }
}

/// Switch the level of a subscriber installed by [`init`]
pub fn set_log_level(level: LoggingLevel) {
    let Some(handle) = FILTER.get() else {
        return;
    };
    if let Err(e) = handle.reload(EnvFilter::new(directive(level, echo_requested()))) {
        tracing::warn!("Changing the log level failed: {}", e);
    }
}

pub fn set_log_to_disk(enabled: bool) {
    TO_DISK.store(enabled, Ordering::Relaxed);
}

pub fn log_to_disk() -> bool {
    TO_DISK.load(Ordering::Relaxed)
}

/// Where rolled log files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFiles {
    pub dir: PathBuf,
    pub prefix: String,
}

impl LogFiles {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: FILE_PREFIX.to_string(),
        }
    }

    /// An explicit file wins over an explicit directory, which wins over the
    /// XDG state directory
    pub fn from_env() -> Self {
        if let Some(file) = std::env::var_os(LOG_FILE_ENV).map(PathBuf::from)
            && let Some(name) = file.file_name()
        {
            return Self {
                dir: file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(state_dir),
                prefix: name.to_string_lossy().into_owned(),
            };
        }

        match std::env::var_os(LOG_DIR_ENV) {
            Some(dir) => Self::in_dir(dir),
            None => Self::in_dir(state_dir()),
        }
    }

    /// Remove rolled files of ours last written before `now - 7 days`
    ///
    /// Returns how many were removed.
    pub fn prune(&self, now: SystemTime) -> usize {
        let Some(cutoff) = now.checked_sub(RETENTION) else {
            return 0;
        };
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };

        entries
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&self.prefix))
            .filter(|entry| {
                entry
                    .metadata()
                    .ok()
                    .filter(fs::Metadata::is_file)
                    .and_then(|m| m.modified().ok())
                    .is_some_and(|modified| modified < cutoff)
            })
            .filter(|entry| fs::remove_file(entry.path()).is_ok())
            .count()
    }

    fn writer(&self) -> io::Result<(NonBlocking, WorkerGuard)> {
        fs::create_dir_all(&self.dir)?;
        let removed = self.prune(SystemTime::now());
        if removed > 0 {
            eprintln!("cosmic-ext-storage: removed {removed} old log files");
        }
        let appender = tracing_appender::rolling::daily(&self.dir, &self.prefix);
        Ok(tracing_appender::non_blocking(appender))
    }
}

fn state_dir() -> PathBuf {
    let base = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("cosmic-ext-storage").join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_echo_survives_quiet_levels() {
        assert_eq!(directive(LoggingLevel::Warn, false), "warn");
        assert_eq!(
            directive(LoggingLevel::Warn, true),
            "warn,storage_engine::command=info"
        );
        assert_eq!(
            directive(LoggingLevel::Error, true),
            "error,storage_engine::command=info"
        );
        assert_eq!(directive(LoggingLevel::Debug, true), "debug");
        assert!(EnvFilter::try_new(directive(LoggingLevel::Warn, true)).is_ok());
    }

    #[test]
    fn prune_removes_only_old_files_with_our_prefix() {
        let dir = tempfile::tempdir().expect("temp dir");
        let files = LogFiles::in_dir(dir.path());
        let rolled = dir.path().join(format!("{FILE_PREFIX}.2020-01-01"));
        let other = dir.path().join("notes.txt");
        let nested = dir.path().join(format!("{FILE_PREFIX}.d"));
        fs::write(&rolled, b"old").expect("write");
        fs::write(&other, b"keep").expect("write");
        fs::create_dir(&nested).expect("mkdir");

        assert_eq!(files.prune(SystemTime::now()), 0);
        assert!(rolled.exists());

        let later = SystemTime::now() + RETENTION + Duration::from_secs(60);
        assert_eq!(files.prune(later), 1);
        assert!(!rolled.exists());
        assert!(other.exists());
        assert!(nested.is_dir());
    }

    #[test]
    fn prune_of_a_missing_directory_is_a_no_op() {
        let files = LogFiles::in_dir("/nonexistent/cosmic-ext-storage/logs");
        assert_eq!(files.prune(SystemTime::now()), 0);
    }

    #[test]
    fn disk_switch_is_observable() {
        set_log_to_disk(false);
        assert!(!log_to_disk());
        set_log_to_disk(true);
        assert!(log_to_disk());
    }
}
