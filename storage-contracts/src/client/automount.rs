// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use zbus::proxy;

use super::connection::{BusKind, BusRuntime};
use crate::{AutomountControl, ChannelError};

const AUTOMOUNTER_MODULE: &str = "device_automounter";

/// KDE daemon module loader on the session bus
#[proxy(
    interface = "org.kde.kded5",
    default_service = "org.kde.kded5",
    default_path = "/kded"
)]
pub trait Kded {
    #[zbus(name = "loadedModules")]
    async fn loaded_modules(&self) -> zbus::Result<Vec<String>>;

    #[zbus(name = "unloadModule")]
    async fn unload_module(&self, name: &str) -> zbus::Result<bool>;

    #[zbus(name = "loadModule")]
    async fn load_module(&self, name: &str) -> zbus::Result<bool>;
}

/// Suppresses the KDE device automounter by unloading its kded module
pub struct KdedAutomount {
    bus: Arc<BusRuntime>,
}

impl KdedAutomount {
    pub fn new(bus: Arc<BusRuntime>) -> Self {
        Self { bus }
    }

    async fn proxy(&self) -> Result<KdedProxy<'static>, ChannelError> {
        let conn = self.bus.connection(BusKind::Session).await?;
        Ok(KdedProxy::new(&conn).await?)
    }
}

impl AutomountControl for KdedAutomount {
    fn suppress(&self) -> Result<bool, ChannelError> {
        self.bus.block_on(async {
            let kded = self.proxy().await?;
            let loaded = kded.loaded_modules().await?;
            if !loaded.iter().any(|m| m == AUTOMOUNTER_MODULE) {
                return Ok(false);
            }
            if !kded.unload_module(AUTOMOUNTER_MODULE).await? {
                tracing::warn!("kded refused to unload {}", AUTOMOUNTER_MODULE);
                return Ok(false);
            }
            tracing::debug!("Unloaded kded module {}", AUTOMOUNTER_MODULE);
            Ok(true)
        })
    }

    fn restore(&self) -> Result<(), ChannelError> {
        self.bus.block_on(async {
            let kded = self.proxy().await?;
            if !kded.load_module(AUTOMOUNTER_MODULE).await? {
                tracing::warn!("kded could not load {}", AUTOMOUNTER_MODULE);
            }
            Ok(())
        })
    }
}
