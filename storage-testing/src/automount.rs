// SPDX-License-Identifier: GPL-3.0-only

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use storage_contracts::{AutomountControl, ChannelError};

/// Automounter toggle that remembers how often it was flipped
pub struct FakeAutomount {
    active: AtomicBool,
    suppressed: AtomicUsize,
    restored: AtomicUsize,
    fail_suppress: bool,
}

impl FakeAutomount {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
            suppressed: AtomicUsize::new(0),
            restored: AtomicUsize::new(0),
            fail_suppress: false,
        }
    }

    /// A toggle whose suppression request errors out
    pub fn unreachable() -> Self {
        Self {
            fail_suppress: true,
            ..Self::new(true)
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn suppress_count(&self) -> usize {
        self.suppressed.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }
}

impl AutomountControl for FakeAutomount {
    fn suppress(&self) -> Result<bool, ChannelError> {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
        if self.fail_suppress {
            return Err(ChannelError::BusUnavailable("no session bus".to_string()));
        }
        Ok(self.active.swap(false, Ordering::SeqCst))
    }

    fn restore(&self) -> Result<(), ChannelError> {
        self.restored.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }
}
