// SPDX-License-Identifier: GPL-3.0-only

//! Jobs: the all-or-nothing steps Operations are made of

use chrono::Utc;
use storage_types::{CommandRequest, CommandResult, JobStatus, Report, ReportStatus};

use crate::command::CommandChannel;
use crate::error::JobError;

/// What a running Job gets to work with
///
/// The report is the Job's own node; progress goes to whoever runs the Job
/// and is only connected for the duration of one run.
pub struct JobContext<'a> {
    report: &'a mut Report,
    channel: &'a CommandChannel,
    progress: &'a mut dyn FnMut(u8),
}

impl<'a> JobContext<'a> {
    pub fn new(
        report: &'a mut Report,
        channel: &'a CommandChannel,
        progress: &'a mut dyn FnMut(u8),
    ) -> Self {
        Self {
            report,
            channel,
            progress,
        }
    }

    pub fn report(&mut self) -> &mut Report {
        &mut *self.report
    }

    pub fn channel(&self) -> &CommandChannel {
        self.channel
    }

    pub fn progress(&mut self, percent: u8) {
        (self.progress)(percent.min(100));
    }

    /// Run a command, recording it on this Job's report
    pub fn run(&mut self, request: CommandRequest) -> CommandResult {
        self.channel.run(Some(&mut *self.report), request)
    }

    /// Run a command that has to complete with exit code 0
    pub fn run_checked(&mut self, request: CommandRequest) -> Result<CommandResult, JobError> {
        let command = request.command.clone();
        let result = self.run(request);
        if result.succeeded() {
            Ok(result)
        } else {
            Err(JobError::CommandFailed {
                command,
                exit_code: result.exit_code,
            })
        }
    }

    /// Split the borrow so a command can be recorded while progress flows
    pub(crate) fn parts(&mut self) -> (&mut Report, &CommandChannel, &mut dyn FnMut(u8)) {
        (&mut *self.report, self.channel, &mut *self.progress)
    }
}

pub trait Job: Send {
    fn description(&self) -> String;

    /// Progress granularity
    fn num_steps(&self) -> u32 {
        1
    }

    /// Do the work; there is no partial success
    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError>;

    /// Bring in-memory state in line with what `run` actually did
    ///
    /// Called right after `run`, whatever its outcome, before the next Job
    /// starts.
    fn preview(&mut self, _status: JobStatus) {}
}

/// Run `job` inside a new child of `parent` and record its outcome there
pub fn execute(
    job: &mut dyn Job,
    parent: &mut Report,
    channel: &CommandChannel,
    progress: &mut dyn FnMut(u8),
) -> JobStatus {
    let report = parent.new_child(job.description());
    report.started_at = Some(Utc::now());

    let outcome = {
        let mut ctx = JobContext::new(report, channel, progress);
        job.run(&mut ctx)
    };

    let status = match outcome {
        Ok(()) => {
            report.set_status(ReportStatus::Success);
            JobStatus::Success
        }
        Err(e) => {
            tracing::warn!("{}: {}", job.description(), e);
            report.line(e.to_string());
            report.set_status(ReportStatus::Error);
            JobStatus::Error
        }
    };

    job.preview(status);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storage_testing::{FakeAuthority, ScriptedTransport};

    use crate::config::EngineConfig;
    use crate::session::AuthSession;

    struct Probe {
        fail: bool,
        previewed: Option<JobStatus>,
    }

    impl Job for Probe {
        fn description(&self) -> String {
            "Probe".to_string()
        }

        fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
            ctx.run_checked(CommandRequest::new("sfdisk", ["--dump", "/dev/sda"]))?;
            ctx.progress(150);
            if self.fail {
                return Err(JobError::Failed("probe failed".to_string()));
            }
            Ok(())
        }

        fn preview(&mut self, status: JobStatus) {
            self.previewed = Some(status);
        }
    }

    fn channel() -> CommandChannel {
        let config = EngineConfig::default();
        let session = AuthSession::new(Arc::new(FakeAuthority::granting()), &config);
        CommandChannel::new(Arc::new(ScriptedTransport::new()), session, &config).with_echo(false)
    }

    #[test]
    fn outcome_lands_on_the_job_node() {
        let channel = channel();
        let mut parent = Report::new("op");
        let mut percents = Vec::new();

        let mut job = Probe {
            fail: false,
            previewed: None,
        };
        let status = execute(&mut job, &mut parent, &channel, &mut |p| percents.push(p));

        assert_eq!(status, JobStatus::Success);
        assert_eq!(job.previewed, Some(JobStatus::Success));
        assert_eq!(percents, [100]);

        let node = &parent.children[0];
        assert_eq!(node.action, "Probe");
        assert!(node.started_at.is_some());
        assert_eq!(node.status, Some(ReportStatus::Success));
        assert_eq!(node.children.len(), 1);
    }

    #[test]
    fn failure_is_recorded_and_still_previewed() {
        let channel = channel();
        let mut parent = Report::new("op");

        let mut job = Probe {
            fail: true,
            previewed: None,
        };
        let status = execute(&mut job, &mut parent, &channel, &mut |_| {});

        assert_eq!(status, JobStatus::Error);
        assert_eq!(job.previewed, Some(JobStatus::Error));
        let node = &parent.children[0];
        assert_eq!(node.status, Some(ReportStatus::Error));
        assert_eq!(node.lines.last().map(String::as_str), Some("probe failed"));
    }
}
