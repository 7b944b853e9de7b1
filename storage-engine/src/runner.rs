// SPDX-License-Identifier: GPL-3.0-only

//! The Operation runner
//!
//! Runs every Operation of a stack in order on its own thread. Between
//! Operations it waits at the suspend gate and checks for cancellation; there
//! is no way to interrupt a Job that already started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use storage_contracts::{AutomountControl, RunEvent, RunOutcome};
use storage_types::{OperationStatus, Report};
use tokio::sync::mpsc::UnboundedSender;

use crate::automount::AutomountGuard;
use crate::command::CommandChannel;
use crate::error::EngineError;
use crate::stack::OperationStack;

/// Handles a controller uses to steer a run from another thread
#[derive(Debug, Default)]
pub struct RunControl {
    cancelling: AtomicBool,
    suspend: Mutex<()>,
}

impl RunControl {
    /// Stop before the next Operation
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancelling.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancelling.load(Ordering::SeqCst)
    }

    /// Hold the run before its next Operation for as long as the guard lives
    pub fn suspend(&self) -> MutexGuard<'_, ()> {
        self.suspend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pass_gate(&self) {
        drop(self.suspend());
    }

    fn reset(&self) {
        self.cancelling.store(false, Ordering::SeqCst);
    }
}

/// What a finished run hands back
#[derive(Debug)]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub stack: OperationStack,
    pub report: Report,
}

pub struct OperationRunner {
    stack: OperationStack,
    report: Option<Report>,
    channel: Arc<CommandChannel>,
    automount: Arc<dyn AutomountControl>,
    control: Arc<RunControl>,
    events: UnboundedSender<RunEvent>,
}

impl OperationRunner {
    pub fn new(
        stack: OperationStack,
        channel: Arc<CommandChannel>,
        automount: Arc<dyn AutomountControl>,
        events: UnboundedSender<RunEvent>,
    ) -> Self {
        Self {
            stack,
            report: None,
            channel,
            automount,
            control: Arc::new(RunControl::default()),
            events,
        }
    }

    /// Bind the report the run writes into; required before running
    pub fn set_report(&mut self, report: Report) {
        self.report = Some(report);
    }

    /// Steer the run through a control created ahead of time
    pub fn with_control(mut self, control: Arc<RunControl>) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    pub fn num_operations(&self) -> usize {
        self.stack.len()
    }

    pub fn num_jobs(&self) -> usize {
        self.stack.num_jobs()
    }

    /// Description of the Operation at `index`
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn description(&self, index: usize) -> &str {
        assert!(
            index < self.stack.len(),
            "operation index {index} out of range ({} queued)",
            self.stack.len()
        );
        self.stack
            .get(index)
            .map(|op| op.description())
            .unwrap_or_default()
    }

    /// Run every Operation on the calling thread
    ///
    /// # Panics
    ///
    /// If no report was bound with [`OperationRunner::set_report`].
    pub fn run(&mut self) -> RunOutcome {
        let Self {
            stack,
            report,
            channel,
            automount,
            control,
            events,
        } = self;

        let Some(report) = report.as_mut() else {
            panic!("OperationRunner::run called without a report");
        };

        let mut emit = |event: RunEvent| {
            // A caller that stopped listening does not stop the run
            let _ = events.send(event);
        };

        control.reset();

        let automount_guard = AutomountGuard::suppress(automount.as_ref());
        let mut status = true;

        for (i, op) in stack.iter_mut().enumerate() {
            control.pass_gate();

            if !status || control.is_cancelling() {
                break;
            }

            let index = i + 1;
            op.set_status(OperationStatus::Running);
            tracing::info!("Operation {}: {}", index, op.description());
            emit(RunEvent::OperationStarted {
                index,
                id: op.id(),
                description: op.description().to_string(),
            });

            status = op.execute(index, report, channel.as_ref(), &mut emit);

            emit(RunEvent::OperationFinished {
                index,
                id: op.id(),
                status: op.status(),
            });
        }

        drop(automount_guard);

        let outcome = if !status {
            RunOutcome::Error
        } else if control.is_cancelling() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Finished
        };

        tracing::info!("Run complete: {:?}", outcome);
        emit(RunEvent::Completed { outcome });
        outcome
    }

    /// Run on a dedicated thread
    ///
    /// The stack and report come back through the handle once the run ends.
    pub fn spawn(mut self) -> Result<RunHandle, EngineError> {
        let control = self.control.clone();
        let handle = thread::Builder::new()
            .name("operation-runner".to_string())
            .spawn(move || {
                let outcome = self.run();
                RunResult {
                    outcome,
                    stack: self.stack,
                    report: self.report.unwrap_or_default(),
                }
            })?;
        Ok(RunHandle { handle, control })
    }
}

pub struct RunHandle {
    handle: JoinHandle<RunResult>,
    control: Arc<RunControl>,
}

impl RunHandle {
    pub fn control(&self) -> &Arc<RunControl> {
        &self.control
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end
    pub fn join(self) -> thread::Result<RunResult> {
        self.handle.join()
    }
}
