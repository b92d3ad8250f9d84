//! Shared realms for recorder sessions.

use crate::broker::{unexpected, BrokerRealm, BrokerReply, BrokerRequest};
use crate::config::HostConfig;
use crate::error::Result;
use crate::format::EncoderRegistry;
use crate::render::{RenderContext, RenderHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use tutti_rpc::{port_pair, RpcChannel};

pub type BrokerChannel = RpcChannel<BrokerRequest, BrokerReply>;

struct Realms {
    broker: BrokerRealm,
    render: RenderContext,
    channel: BrokerChannel,
}

impl Realms {
    fn shut_down(mut self) {
        self.render.stop();
        self.broker.stop();
        tracing::info!("recorder host realms shut down");
    }
}

struct HostInner {
    config: HostConfig,
    registry: Arc<EncoderRegistry>,
    leases: Mutex<(usize, Option<Realms>)>,
}

/// Owns the encoder broker and render realms used by recorder sessions.
///
/// Realms are spawned on the first [`acquire`](Self::acquire) and shut down
/// when the last [`HostLease`] is dropped; a later acquire spawns them again.
/// Cloning yields another handle to the same host.
#[derive(Clone)]
pub struct RecorderHost {
    inner: Arc<HostInner>,
}

impl Default for RecorderHost {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl RecorderHost {
    pub fn new(config: HostConfig) -> Self {
        Self::with_registry(config, EncoderRegistry::default())
    }

    pub fn with_registry(config: HostConfig, registry: EncoderRegistry) -> Self {
        Self {
            inner: Arc::new(HostInner {
                config,
                registry: Arc::new(registry),
                leases: Mutex::new((0, None)),
            }),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &EncoderRegistry {
        &self.inner.registry
    }

    pub fn is_type_supported(&self, mime_type: &str) -> bool {
        self.inner.registry.supports(mime_type)
    }

    /// Take a reference on the realms, spawning them if needed. Must be
    /// called within a tokio runtime.
    pub fn acquire(&self) -> Result<HostLease> {
        let mut leases = self.inner.leases.lock();
        let (count, realms) = &mut *leases;

        let running = match realms.take() {
            Some(running) => running,
            None => {
                let (broker, port) = BrokerRealm::spawn(Arc::clone(&self.inner.registry))?;
                let render = RenderContext::spawn(self.inner.config.render_interval)?;
                let (channel, _incoming) = RpcChannel::connect_with(port, self.inner.config.ids);
                tracing::info!("recorder host realms spawned");
                Realms {
                    broker,
                    render,
                    channel,
                }
            }
        };
        let broker = running.channel.clone();
        let render = running.render.handle();
        *realms = Some(running);
        *count += 1;
        Ok(HostLease {
            host: Arc::clone(&self.inner),
            broker,
            render,
        })
    }

    /// Outstanding leases.
    pub fn lease_count(&self) -> usize {
        self.inner.leases.lock().0
    }

    pub fn is_running(&self) -> bool {
        self.inner.leases.lock().1.is_some()
    }
}

impl std::fmt::Debug for RecorderHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderHost")
            .field("leases", &self.lease_count())
            .field("running", &self.is_running())
            .finish()
    }
}

/// A reference on a host's realms, released on drop.
pub struct HostLease {
    host: Arc<HostInner>,
    broker: BrokerChannel,
    render: RenderHandle,
}

impl HostLease {
    /// The host's shared broker channel.
    pub fn broker(&self) -> &BrokerChannel {
        &self.broker
    }

    pub fn render(&self) -> &RenderHandle {
        &self.render
    }

    pub fn config(&self) -> &HostConfig {
        &self.host.config
    }

    /// Open a direct channel to the broker.
    pub async fn connect_broker(&self) -> Result<BrokerChannel> {
        let (client, server) = port_pair();
        match self
            .broker
            .call(BrokerRequest::Register { port: server })
            .await?
        {
            BrokerReply::Registered => {}
            _ => return Err(unexpected("register")),
        }
        let (channel, _incoming) = RpcChannel::connect_with(client, self.host.config.ids);
        Ok(channel)
    }
}

impl Drop for HostLease {
    fn drop(&mut self) {
        let released = {
            let mut leases = self.host.leases.lock();
            leases.0 = leases.0.saturating_sub(1);
            if leases.0 == 0 {
                leases.1.take()
            } else {
                None
            }
        };
        let Some(realms) = released else {
            return;
        };
        // Joining the realm threads blocks, keep that off async workers.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || realms.shut_down());
            }
            Err(_) => realms.shut_down(),
        }
    }
}

impl std::fmt::Debug for HostLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLease").finish_non_exhaustive()
    }
}
