// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use storage_types::{CommandRequest, CommandResult, CopyEndpoint};
use zbus::fdo::{DBusProxy, StartServiceReply};
use zbus::names::{BusName, WellKnownName};
use zbus::proxy;
use zbus::proxy::CacheProperties;

use super::connection::{BusKind, BusRuntime};
use crate::{ChannelError, CopyReply, HelperTransport, ReadyWaiter};

/// D-Bus proxy interface of the privileged helper
#[proxy(
    interface = "org.cosmic.ext.Storage.Helper",
    default_service = "org.cosmic.ext.Storage.Helper",
    default_path = "/org/cosmic/ext/Storage/Helper"
)]
pub trait Helper {
    /// Run a command; returns (exit code, output, success)
    async fn start(
        &self,
        command: &str,
        args: &[String],
        input: &[u8],
        mode: u32,
    ) -> zbus::Result<(i32, Vec<u8>, bool)>;

    /// Copy a byte range; an empty path means an in-memory endpoint
    async fn copy_blocks(
        &self,
        source_path: &str,
        source_first_byte: u64,
        source_length: u64,
        source_data: &[u8],
        target_path: &str,
        target_first_byte: u64,
        block_size: u64,
    ) -> zbus::Result<(bool, Vec<u8>)>;

    async fn write_data(
        &self,
        buffer: &[u8],
        target_device: &str,
        target_first_byte: u64,
    ) -> zbus::Result<bool>;

    async fn exit(&self) -> zbus::Result<()>;

    /// Emitted once the helper accepts commands
    #[zbus(signal)]
    async fn ready(&self) -> zbus::Result<()>;

    /// Emitted after every copied block
    #[zbus(signal)]
    async fn progress(&self, percent: i32) -> zbus::Result<()>;
}

/// [`HelperTransport`] over the message bus
pub struct DbusHelperTransport {
    bus: Arc<BusRuntime>,
    kind: BusKind,
    service: String,
    path: String,
    timeout: Duration,
}

impl DbusHelperTransport {
    pub fn new(
        bus: Arc<BusRuntime>,
        kind: BusKind,
        service: impl Into<String>,
        path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            bus,
            kind,
            service: service.into(),
            path: path.into(),
            timeout,
        }
    }

    async fn proxy(&self) -> Result<HelperProxy<'static>, ChannelError> {
        let conn = self.bus.connection(self.kind).await?;
        Ok(HelperProxy::builder(&conn)
            .destination(self.service.clone())?
            .path(self.path.clone())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?)
    }

    async fn dbus(&self) -> Result<DBusProxy<'static>, ChannelError> {
        let conn = self.bus.connection(self.kind).await?;
        Ok(DBusProxy::new(&conn).await?)
    }

    /// Await `call`, bounded by the configured timeout
    async fn bounded<T, F>(&self, call: F) -> Result<T, ChannelError>
    where
        F: std::future::Future<Output = zbus::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(ChannelError::Timeout(self.timeout)),
        }
    }
}

struct DbusReadyWaiter {
    handle: tokio::runtime::Handle,
    stream: BoxStream<'static, ()>,
    already_running: bool,
}

impl ReadyWaiter for DbusReadyWaiter {
    fn wait(self: Box<Self>, timeout: Duration) -> Result<(), ChannelError> {
        if self.already_running {
            return Ok(());
        }
        let mut stream = self.stream;
        match self
            .handle
            .block_on(async move { tokio::time::timeout(timeout, stream.next()).await })
        {
            Ok(Some(())) => Ok(()),
            Ok(None) => Err(ChannelError::HelperUnreachable(
                "helper went away before it was ready".to_string(),
            )),
            Err(_) => Err(ChannelError::Timeout(timeout)),
        }
    }
}

impl HelperTransport for DbusHelperTransport {
    fn bus_available(&self) -> bool {
        match self.bus.block_on(self.bus.connection(self.kind)) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        }
    }

    fn helper_registered(&self) -> Result<bool, ChannelError> {
        self.bus.block_on(async {
            let name = BusName::try_from(self.service.as_str())
                .map_err(|e| ChannelError::Protocol(format!("Invalid bus name: {e}")))?;
            Ok(self.dbus().await?.name_has_owner(name).await?)
        })
    }

    fn launch_helper(&self) -> Result<Box<dyn ReadyWaiter>, ChannelError> {
        let (stream, reply) = self.bus.block_on(async {
            let name = WellKnownName::try_from(self.service.as_str())
                .map_err(|e| ChannelError::Protocol(format!("Invalid bus name: {e}")))?;

            // Subscribe first so the readiness signal cannot slip past us
            let stream = self.proxy().await?.receive_ready().await?.map(|_| ()).boxed();
            let reply = self.dbus().await?.start_service_by_name(name, 0).await?;
            Ok::<_, ChannelError>((stream, reply))
        })?;

        let already_running = matches!(StartServiceReply::try_from(reply), Ok(StartServiceReply::AlreadyRunning));
        if already_running {
            tracing::debug!("{} was already running", self.service);
        }

        Ok(Box::new(DbusReadyWaiter {
            handle: self.bus.handle(),
            stream,
            already_running,
        }))
    }

    fn start(&self, request: &CommandRequest) -> Result<CommandResult, ChannelError> {
        self.bus.block_on(async {
            let proxy = self.proxy().await?;
            let input = request.input.as_deref().unwrap_or_default();
            let (exit_code, output, success) = self
                .bounded(proxy.start(&request.command, &request.args, input, request.mode.as_u32()))
                .await?;
            Ok(CommandResult::completed(exit_code, output, success))
        })
    }

    fn copy_blocks(
        &self,
        source: &CopyEndpoint,
        target: &CopyEndpoint,
        block_size: u64,
        progress: &mut dyn FnMut(u8),
    ) -> Result<CopyReply, ChannelError> {
        let source_path = source.wire_path();
        let target_path = target.wire_path();
        let source_data = source.buffer_data().unwrap_or_default();

        let (success, data) = self.bus.block_on(async {
            let proxy = self.proxy().await?;
            let mut signals = proxy.receive_progress().await?;

            let call = proxy.copy_blocks(
                &source_path,
                source.first_byte,
                source.length,
                source_data,
                &target_path,
                target.first_byte,
                block_size,
            );
            tokio::pin!(call);

            let relay = async {
                loop {
                    tokio::select! {
                        reply = &mut call => break reply,
                        Some(signal) = signals.next() => {
                            if let Ok(args) = signal.args() {
                                progress((*args.percent()).clamp(0, 100) as u8);
                            }
                        }
                    }
                }
            };

            self.bounded(relay).await
        })?;

        Ok(CopyReply {
            success,
            target_data: target.is_buffer().then_some(data),
        })
    }

    fn write_data(&self, buffer: &[u8], target: &str, first_byte: u64) -> Result<bool, ChannelError> {
        self.bus.block_on(async {
            let proxy = self.proxy().await?;
            self.bounded(proxy.write_data(buffer, target, first_byte)).await
        })
    }

    fn shutdown(&self) -> Result<(), ChannelError> {
        self.bus.block_on(async {
            let proxy = self.proxy().await?;
            self.bounded(proxy.exit()).await
        })
    }
}
