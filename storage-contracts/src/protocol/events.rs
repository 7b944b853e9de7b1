// SPDX-License-Identifier: GPL-3.0-only

//! Lifecycle events a run publishes to its observer
//!
//! Operation indices are 1-based, matching what a progress dialog shows.
//! Job indices are 0-based positions inside their Operation.

use serde::{Deserialize, Serialize};
use storage_types::{JobStatus, OperationStatus};

use super::id::OperationId;

/// The single authoritative outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Finished,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    OperationStarted {
        index: usize,
        id: OperationId,
        description: String,
    },
    JobStarted {
        operation: usize,
        job: usize,
        description: String,
    },
    /// Sub-step progress of the running Job, in percent
    Progress {
        operation: usize,
        job: usize,
        percent: u8,
    },
    JobFinished {
        operation: usize,
        job: usize,
        status: JobStatus,
    },
    OperationFinished {
        index: usize,
        id: OperationId,
        status: OperationStatus,
    },
    /// Emitted exactly once, after everything else
    Completed { outcome: RunOutcome },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_tag() {
        let event = RunEvent::Completed {
            outcome: RunOutcome::Cancelled,
        };
        let json = serde_json::to_string(&event).expect("serialize event");
        assert!(json.contains("\"event\":\"completed\""));
        let parsed: RunEvent = serde_json::from_str(&json).expect("deserialize event");
        assert!(parsed.is_terminal());
        assert_eq!(parsed, event);
    }
}
