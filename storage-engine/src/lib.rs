// SPDX-License-Identifier: GPL-3.0-only

//! Operation/Job execution engine for COSMIC Ext Storage
//!
//! Queued [`Operation`]s are run in order by an [`OperationRunner`] on its own
//! thread. Every privileged action a Job takes goes through the
//! [`CommandChannel`] to the privileged helper, authorized once per session.

pub mod automount;
pub mod backend;
pub mod command;
pub mod config;
pub mod error;
pub mod fs;
pub mod job;
pub mod jobs;
pub mod logging;
pub mod operation;
pub mod ops;
pub mod runner;
pub mod session;
pub mod stack;

use std::sync::Arc;

use storage_contracts::client::{BusKind, BusRuntime, DbusHelperTransport, KdedAutomount, PolkitAuthority};
use storage_contracts::{AutomountControl, ChannelError, HelperTransport, NoAutomount, PolicyAuthority, RunEvent};
use tokio::sync::mpsc::UnboundedSender;

// Re-export storage-types and the event types callers observe
pub use storage_contracts::{OperationId, RunOutcome};
pub use storage_types;

pub use backend::{PartitionTableBackend, SfdiskBackend};
pub use command::{CommandChannel, CopyResult, DEBUG_ENV};
pub use config::{AutomountBackend, EngineConfig, ExistingHelperPolicy, LoggingLevel};
pub use error::{EngineError, JobError};
pub use fs::{CommandSupport, FileSystem, FileSystemRegistry};
pub use job::{Job, JobContext};
pub use jobs::{SharedPartition, shared};
pub use operation::Operation;
pub use runner::{OperationRunner, RunControl, RunHandle, RunResult};
pub use session::AuthSession;
pub use stack::OperationStack;

/// Everything a run needs, wired up once per process
pub struct Engine {
    config: EngineConfig,
    channel: Arc<CommandChannel>,
    automount: Arc<dyn AutomountControl>,
    registry: FileSystemRegistry,
    backend: Arc<dyn PartitionTableBackend>,
}

impl Engine {
    /// Connect to the helper, polkit and the automounter over D-Bus
    ///
    /// Nothing is started yet; the helper comes up with the first privileged
    /// request.
    pub fn connect(config: EngineConfig) -> Result<Self, EngineError> {
        let bus = BusRuntime::new()?;
        let kind = if config.session_bus {
            BusKind::Session
        } else {
            BusKind::System
        };

        let transport = Arc::new(DbusHelperTransport::new(
            bus.clone(),
            kind,
            &config.helper_bus_name,
            &config.helper_object_path,
            config.command_timeout(),
        ));
        let authority = Arc::new(PolkitAuthority::new(bus.clone()));
        let automount: Arc<dyn AutomountControl> = match config.automount {
            AutomountBackend::Kded => Arc::new(KdedAutomount::new(bus)),
            AutomountBackend::None => Arc::new(NoAutomount),
        };

        tracing::info!(
            "Engine using helper {} on the {:?} bus",
            config.helper_bus_name,
            kind
        );

        Ok(Self::with_parts(
            config,
            transport,
            authority,
            automount,
            FileSystemRegistry::detect(),
        ))
    }

    /// Build from explicit collaborators
    pub fn with_parts(
        config: EngineConfig,
        transport: Arc<dyn HelperTransport>,
        authority: Arc<dyn PolicyAuthority>,
        automount: Arc<dyn AutomountControl>,
        registry: FileSystemRegistry,
    ) -> Self {
        let session = AuthSession::new(authority, &config);
        let channel = Arc::new(CommandChannel::new(transport, session, &config));
        Self {
            config,
            channel,
            automount,
            registry,
            backend: Arc::new(SfdiskBackend::new()),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn PartitionTableBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn channel(&self) -> &Arc<CommandChannel> {
        &self.channel
    }

    pub fn registry(&self) -> &FileSystemRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn PartitionTableBackend> {
        &self.backend
    }

    /// A runner for `stack`, reporting to `events`
    pub fn runner(&self, stack: OperationStack, events: UnboundedSender<RunEvent>) -> OperationRunner {
        OperationRunner::new(stack, self.channel.clone(), self.automount.clone(), events)
    }

    /// Stop the helper if this process started it
    pub fn shutdown(&self) -> Result<(), ChannelError> {
        self.channel.stop_helper()
    }
}
