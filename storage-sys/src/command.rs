// SPDX-License-Identifier: GPL-3.0-only

//! External command execution

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use storage_types::{CommandRequest, CommandResult, OutputMode};

/// Run a command to completion and capture its output
///
/// `success` is true when the process ran and exited normally, independent of
/// its exit code. A command that cannot be spawned yields the never-completed
/// sentinel.
pub fn run_command(request: &CommandRequest) -> CommandResult {
    match spawn_and_wait(request) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Failed to run {}: {}", request.command, e);
            CommandResult::never_completed()
        }
    }
}

fn spawn_and_wait(request: &CommandRequest) -> std::io::Result<CommandResult> {
    let mut cmd = Command::new(&request.command);
    cmd.args(&request.args)
        .stdin(if request.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .env("LC_ALL", "C");

    // Merged mode shares one pipe between stdout and stderr so ordering is kept.
    let merged_reader = match request.mode {
        OutputMode::Merged => {
            let (reader, writer) = std::io::pipe()?;
            cmd.stdout(writer.try_clone()?).stderr(writer);
            Some(reader)
        }
        OutputMode::Separate => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            None
        }
    };

    let mut child = cmd.spawn()?;
    // Drop our copies of the pipe writers, otherwise reads never see EOF.
    drop(cmd);

    let stdin_writer = match (child.stdin.take(), request.input.clone()) {
        (Some(mut stdin), Some(input)) => Some(thread::spawn(move || {
            if let Err(e) = stdin.write_all(&input) {
                tracing::debug!("Writing command input failed: {}", e);
            }
        })),
        _ => None,
    };

    let mut output = Vec::new();
    let mut stderr = Vec::new();

    if let Some(mut reader) = merged_reader {
        reader.read_to_end(&mut output)?;
    } else {
        let stderr_reader = child.stderr.take().map(|mut err| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf);
                buf
            })
        });
        if let Some(mut out) = child.stdout.take() {
            out.read_to_end(&mut output)?;
        }
        if let Some(handle) = stderr_reader {
            stderr = handle.join().unwrap_or_default();
        }
    }

    let status = child.wait()?;

    if let Some(handle) = stdin_writer {
        let _ = handle.join();
    }

    if !stderr.is_empty() {
        tracing::debug!(
            "{} stderr: {}",
            request.command,
            String::from_utf8_lossy(&stderr).trim_end()
        );
    }

    Ok(match status.code() {
        Some(code) => CommandResult::completed(code, output, true),
        // Killed by a signal
        None => CommandResult::completed(storage_types::NEVER_COMPLETED, output, false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_types::NEVER_COMPLETED;

    #[test]
    fn missing_binary_never_completes() {
        let result = run_command(&CommandRequest::new(
            "definitely-not-a-real-tool-4711",
            ["--version"],
        ));
        assert!(!result.success);
        assert_eq!(result.exit_code, NEVER_COMPLETED);
    }

    #[test]
    fn stdin_input_reaches_the_command() {
        let result = run_command(&CommandRequest::new("cat", Vec::<String>::new()).with_input(b"hello".to_vec()));
        assert!(result.succeeded());
        assert_eq!(result.output(), "hello");
    }

    #[test]
    fn nonzero_exit_is_still_a_completed_run() {
        let result = run_command(&CommandRequest::new("sh", ["-c", "exit 3"]));
        assert!(result.success);
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn merged_mode_captures_stderr() {
        let req = CommandRequest::new("sh", ["-c", "echo out; echo err 1>&2"])
            .with_mode(OutputMode::Merged);
        let output = run_command(&req).output();
        assert!(output.contains("out"));
        assert!(output.contains("err"));

        let separate = run_command(&CommandRequest::new("sh", ["-c", "echo out; echo err 1>&2"]));
        assert!(!separate.output().contains("err"));
    }
}
