// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{OperationId, RunEvent};
use storage_types::{JobStatus, OperationStatus, Report, ReportStatus};

use crate::command::CommandChannel;
use crate::job::{self, Job};

/// One queued user intent, made of Jobs that run in order
pub struct Operation {
    id: OperationId,
    description: String,
    targets: Vec<String>,
    jobs: Vec<Box<dyn Job>>,
    status: OperationStatus,
}

impl Operation {
    pub fn new(description: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            id: OperationId::new(),
            description: description.into(),
            targets,
            jobs: Vec::new(),
            status: OperationStatus::Pending,
        }
    }

    pub fn with_job(mut self, job: impl Job + 'static) -> Self {
        self.add_job(Box::new(job));
        self
    }

    pub fn add_job(&mut self, job: Box<dyn Job>) {
        self.jobs.push(job);
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Device nodes this Operation changes
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn num_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &dyn Job> {
        self.jobs.iter().map(|job| job.as_ref())
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn set_status(&mut self, status: OperationStatus) {
        self.status = status;
    }

    /// Run every Job in order, stopping at the first failure
    ///
    /// `index` is the 1-based position used in the emitted events.
    pub fn execute(
        &mut self,
        index: usize,
        parent: &mut Report,
        channel: &CommandChannel,
        emit: &mut dyn FnMut(RunEvent),
    ) -> bool {
        let report = parent.new_child(self.description.clone());
        let mut success = true;

        for (job_index, job) in self.jobs.iter_mut().enumerate() {
            emit(RunEvent::JobStarted {
                operation: index,
                job: job_index,
                description: job.description(),
            });

            let status = {
                let mut progress = |percent: u8| {
                    emit(RunEvent::Progress {
                        operation: index,
                        job: job_index,
                        percent,
                    })
                };
                job::execute(job.as_mut(), report, channel, &mut progress)
            };

            emit(RunEvent::JobFinished {
                operation: index,
                job: job_index,
                status,
            });

            if status == JobStatus::Error {
                success = false;
                break;
            }
        }

        if success {
            self.status = OperationStatus::Success;
            report.set_status(ReportStatus::Success);
        } else {
            self.status = OperationStatus::Error;
            report.set_status(ReportStatus::Error);
        }

        success
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("targets", &self.targets)
            .field("jobs", &self.jobs.len())
            .field("status", &self.status)
            .finish()
    }
}
