// SPDX-License-Identifier: GPL-3.0-only

//! One-time authorization handshake with the privileged helper
//!
//! The session is owned by the command channel and initialised on the first
//! privileged request. Callers racing to trigger it all block on the same
//! initialisation; the handshake body runs once per session.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use nix::unistd::{Uid, User, getuid};
use storage_contracts::{ChannelError, HelperTransport, PolicyAuthority};
use storage_types::{AuthorizationResult, AuthorizationState, CallerInfo};

use crate::config::{EngineConfig, ExistingHelperPolicy};

pub struct AuthSession {
    authority: Arc<dyn PolicyAuthority>,
    action_id: String,
    caller: CallerInfo,
    existing_helper: ExistingHelperPolicy,
    fail_closed: bool,
    ready_timeout: Duration,
    state: Mutex<AuthorizationState>,
    started: OnceLock<Result<(), ChannelError>>,
}

impl AuthSession {
    pub fn new(authority: Arc<dyn PolicyAuthority>, config: &EngineConfig) -> Self {
        Self {
            authority,
            action_id: config.action_id.clone(),
            caller: current_caller(),
            existing_helper: config.existing_helper,
            fail_closed: config.fail_closed,
            ready_timeout: config.helper_start_timeout(),
            state: Mutex::new(AuthorizationState::NotRequested),
            started: OnceLock::new(),
        }
    }

    pub fn state(&self) -> AuthorizationState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the handshake ran and left a usable helper behind
    pub fn helper_started(&self) -> bool {
        matches!(self.started.get(), Some(Ok(())))
    }

    /// Make sure the helper runs, performing the handshake on first use
    ///
    /// A denied authorization is logged and the helper is used anyway unless
    /// the session is fail-closed; the helper rejects unauthorized callers
    /// itself.
    pub fn ensure_started(&self, transport: &dyn HelperTransport) -> Result<(), ChannelError> {
        self.started
            .get_or_init(|| self.handshake(transport))
            .clone()?;

        if self.fail_closed && self.state() == AuthorizationState::Denied {
            return Err(ChannelError::AuthorizationDenied(self.action_id.clone()));
        }
        Ok(())
    }

    fn set_state(&self, state: AuthorizationState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn handshake(&self, transport: &dyn HelperTransport) -> Result<(), ChannelError> {
        if transport.helper_registered()? {
            match self.existing_helper {
                ExistingHelperPolicy::Exit => {
                    tracing::error!(
                        "The privileged helper is already in use by another process, exiting"
                    );
                    std::process::exit(0);
                }
                ExistingHelperPolicy::Fail => {
                    tracing::error!("The privileged helper is already in use by another process");
                    return Err(ChannelError::HelperConflict);
                }
            }
        }

        let ready = transport.launch_helper()?;
        self.set_state(AuthorizationState::Requested);

        tracing::debug!(
            "Requesting {} for uid {} (pid {})",
            self.action_id,
            self.caller.uid,
            self.caller.pid
        );
        let granted = match self.authority.authorize_action(&self.action_id, &self.caller) {
            Ok(AuthorizationResult::Yes) => true,
            Ok(result) => {
                tracing::warn!("Authorization for {} answered {:?}", self.action_id, result);
                false
            }
            Err(e) => {
                tracing::warn!("Authorization for {} failed: {}", self.action_id, e);
                false
            }
        };

        ready.wait(self.ready_timeout)?;

        if granted {
            self.set_state(AuthorizationState::Granted);
        } else {
            tracing::error!("Could not obtain administrator privileges for disk operations");
            self.set_state(AuthorizationState::Denied);
        }

        tracing::info!("Privileged helper started");
        Ok(())
    }
}

/// Identity of this process, as the policy service should see it
pub fn current_caller() -> CallerInfo {
    let uid = getuid().as_raw();
    let username = User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name);
    CallerInfo::new(uid, std::process::id(), username, String::new())
}
