// SPDX-License-Identifier: GPL-3.0-only

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use storage_contracts::{HelperTransport, RunEvent};
use storage_engine::{Engine, EngineConfig, FileSystemRegistry, Job, JobContext, JobError};
use storage_testing::{FakeAuthority, FakeAutomount};
use tokio::sync::mpsc::UnboundedReceiver;

/// Journal of which Jobs ran, in order
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("journal").clone()
}

/// A Job that only notes that it ran
pub struct RecordingJob {
    name: String,
    fail: bool,
    journal: Journal,
}

impl RecordingJob {
    pub fn ok(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            journal: journal.clone(),
        }
    }

    pub fn failing(name: &str, journal: &Journal) -> Self {
        Self {
            fail: true,
            ..Self::ok(name, journal)
        }
    }
}

impl Job for RecordingJob {
    fn description(&self) -> String {
        self.name.clone()
    }

    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<(), JobError> {
        self.journal.lock().expect("journal").push(self.name.clone());
        ctx.progress(50);
        if self.fail {
            Err(JobError::Failed(format!("{} failed", self.name)))
        } else {
            Ok(())
        }
    }
}

pub struct Harness {
    pub engine: Engine,
    pub authority: Arc<FakeAuthority>,
    pub automount: Arc<FakeAutomount>,
}

pub fn harness(transport: Arc<dyn HelperTransport>) -> Harness {
    harness_with(transport, FakeAuthority::granting(), EngineConfig::default())
}

pub fn harness_with(
    transport: Arc<dyn HelperTransport>,
    authority: FakeAuthority,
    config: EngineConfig,
) -> Harness {
    let authority = Arc::new(authority);
    let automount = Arc::new(FakeAutomount::new(true));
    let engine = Engine::with_parts(
        config,
        transport,
        authority.clone(),
        automount.clone(),
        FileSystemRegistry::probe(&|_: &str| true),
    );
    Harness {
        engine,
        authority,
        automount,
    }
}

pub fn drain(rx: &mut UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
