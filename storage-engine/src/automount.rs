// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::AutomountControl;

/// Keeps the desktop automounter quiet for as long as it lives
///
/// Restores the automounter on drop, but only if this guard was the one that
/// suppressed it.
pub struct AutomountGuard<'a> {
    control: &'a dyn AutomountControl,
    suppressed: bool,
}

impl<'a> AutomountGuard<'a> {
    pub fn suppress(control: &'a dyn AutomountControl) -> Self {
        let suppressed = match control.suppress() {
            Ok(was_active) => was_active,
            Err(e) => {
                tracing::warn!("Could not suppress the automounter: {}", e);
                false
            }
        };
        if suppressed {
            tracing::debug!("Automounter suppressed");
        }
        Self {
            control,
            suppressed,
        }
    }
}

impl Drop for AutomountGuard<'_> {
    fn drop(&mut self) {
        if !self.suppressed {
            return;
        }
        match self.control.restore() {
            Ok(()) => tracing::debug!("Automounter restored"),
            Err(e) => tracing::warn!("Could not restore the automounter: {}", e),
        }
    }
}
