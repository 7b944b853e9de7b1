// SPDX-License-Identifier: GPL-3.0-only

use crate::operation::Operation;

/// Pending Operations in execution order
///
/// A run takes the stack by value, so nothing can change it while it runs.
#[derive(Debug, Default)]
pub struct OperationStack {
    operations: Vec<Operation>,
}

impl OperationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        tracing::debug!("Queued: {}", operation.description());
        self.operations.push(operation);
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Operation> {
        self.operations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Operation> {
        self.operations.iter_mut()
    }

    /// Jobs across all Operations
    pub fn num_jobs(&self) -> usize {
        self.operations.iter().map(Operation::num_jobs).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobContext};
    use crate::error::JobError;

    struct Noop;

    impl Job for Noop {
        fn description(&self) -> String {
            "noop".to_string()
        }

        fn run(&mut self, _ctx: &mut JobContext<'_>) -> Result<(), JobError> {
            Ok(())
        }
    }

    #[test]
    fn keeps_insertion_order_and_counts_jobs() {
        let mut stack = OperationStack::new();
        stack.push(Operation::new("first", vec![]).with_job(Noop).with_job(Noop));
        stack.push(Operation::new("second", vec!["/dev/sdb".to_string()]).with_job(Noop));

        let names: Vec<_> = stack.iter().map(|op| op.description()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(stack.num_jobs(), 3);

        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.num_jobs(), 0);
    }
}
