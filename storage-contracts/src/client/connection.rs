// SPDX-License-Identifier: GPL-3.0-only

//! Shared D-Bus connection management
//!
//! The engine is synchronous, so the D-Bus clients drive their async calls on
//! a small runtime owned by [`BusRuntime`]. Connections are established lazily
//! on first use and cached for every client sharing the runtime.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use zbus::Connection;

use crate::ChannelError;

/// Which message bus a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusKind {
    #[default]
    System,
    Session,
}

pub struct BusRuntime {
    runtime: tokio::runtime::Runtime,
    system: OnceLock<Connection>,
    session: OnceLock<Connection>,
}

impl BusRuntime {
    pub fn new() -> Result<Arc<Self>, ChannelError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("storage-bus")
            .enable_all()
            .build()
            .map_err(|e| ChannelError::Runtime(format!("Failed to start bus runtime: {}", e)))?;

        Ok(Arc::new(Self {
            runtime,
            system: OnceLock::new(),
            session: OnceLock::new(),
        }))
    }

    /// Block the calling thread on `future`
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }

    /// Get or create the shared connection to `bus`
    pub async fn connection(&self, bus: BusKind) -> Result<Connection, ChannelError> {
        let cell = match bus {
            BusKind::System => &self.system,
            BusKind::Session => &self.session,
        };

        if let Some(conn) = cell.get() {
            return Ok(conn.clone());
        }

        let conn = match bus {
            BusKind::System => Connection::system().await,
            BusKind::Session => Connection::session().await,
        }
        .map_err(|e| ChannelError::BusUnavailable(format!("Failed to connect to {:?} bus: {}", bus, e)))?;

        // Another caller may have won the race; the cell keeps only one
        let _ = cell.set(conn);

        cell.get().cloned().ok_or_else(|| {
            ChannelError::BusUnavailable("Failed to initialize shared bus connection".to_string())
        })
    }
}
