// SPDX-License-Identifier: GPL-3.0-only

//! External command request and result values

use serde::{Deserialize, Serialize};

/// Exit code of a command that never completed (not started, helper unreachable, ...)
pub const NEVER_COMPLETED: i32 = -1;

/// How the helper captures the command's output channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Capture stdout only, stderr is discarded
    #[default]
    Separate,
    /// stdout and stderr are merged into one captured stream
    Merged,
}

impl OutputMode {
    /// Wire representation used by the helper interface
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Separate => 0,
            Self::Merged => 1,
        }
    }

    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Merged,
            _ => Self::Separate,
        }
    }
}

/// A single external command to run, immutable once submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    pub args: Vec<String>,
    pub input: Option<Vec<u8>>,
    pub mode: OutputMode,
}

impl CommandRequest {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            input: None,
            mode: OutputMode::default(),
        }
    }

    /// Bytes written to the command's stdin
    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// `command arg1 arg2 ...` as shown in reports and debug output
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Outcome of a command, block copy or raw write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub output: Vec<u8>,
    /// Decided by the helper; the effective failure signal
    pub success: bool,
}

impl CommandResult {
    /// A request that never reached completion
    pub fn never_completed() -> Self {
        Self {
            exit_code: NEVER_COMPLETED,
            output: Vec::new(),
            success: false,
        }
    }

    pub fn completed(exit_code: i32, output: Vec<u8>, success: bool) -> Self {
        Self {
            exit_code,
            output,
            success,
        }
    }

    /// Result of a copy or write, where the exit code only mirrors success
    pub fn from_success(success: bool) -> Self {
        Self {
            exit_code: if success { 0 } else { 1 },
            output: Vec::new(),
            success,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn raw_output(&self) -> &[u8] {
        &self.output
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Success reported by the helper and a zero exit code
    pub fn succeeded(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

impl Default for CommandResult {
    fn default() -> Self {
        Self::never_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_arguments() {
        let req = CommandRequest::new("xfs_db", ["-c", "sb 0", "/dev/sda1"]);
        assert_eq!(req.command_line(), "xfs_db -c sb 0 /dev/sda1");
        assert_eq!(CommandRequest::new("sync", Vec::<String>::new()).command_line(), "sync");
    }

    #[test]
    fn default_result_is_never_completed() {
        let result = CommandResult::default();
        assert_eq!(result.exit_code(), NEVER_COMPLETED);
        assert!(!result.success);
        assert!(!result.succeeded());
    }

    #[test]
    fn success_flag_and_exit_code_are_independent() {
        let result = CommandResult::completed(2, b"warn".to_vec(), true);
        assert!(result.success);
        assert!(!result.succeeded());
        assert_eq!(result.output(), "warn");
    }

    #[test]
    fn output_mode_wire_values() {
        assert_eq!(OutputMode::from_u32(OutputMode::Merged.as_u32()), OutputMode::Merged);
        assert_eq!(OutputMode::from_u32(7), OutputMode::Separate);
    }
}
