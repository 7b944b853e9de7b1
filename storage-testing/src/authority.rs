// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use storage_contracts::{ChannelError, PolicyAuthority};
use storage_types::{AuthorizationResult, CallerInfo};

/// Policy authority with a fixed answer that counts its decisions
pub struct FakeAuthority {
    result: AuthorizationResult,
    delay: Duration,
    calls: AtomicUsize,
    actions: Mutex<Vec<String>>,
}

impl FakeAuthority {
    pub fn new(result: AuthorizationResult) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn granting() -> Self {
        Self::new(AuthorizationResult::Yes)
    }

    pub fn denying() -> Self {
        Self::new(AuthorizationResult::No)
    }

    /// Take `delay` before answering, like a user typing a password
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl PolicyAuthority for FakeAuthority {
    fn authorize_action(
        &self,
        action_id: &str,
        _caller: &CallerInfo,
    ) -> Result<AuthorizationResult, ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action_id.to_string());
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.result)
    }
}
