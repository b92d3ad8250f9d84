//! Encoder broker realm.
//!
//! The broker runs on its own thread with a single-threaded runtime and is
//! reached only through RPC ports. Each encoder instance owns a frame port
//! through which a capture node streams samples; a drain task feeds those
//! frames into the encoder as they arrive.

use crate::error::{RecorderError, Result};
use crate::format::{Encoder, EncoderRegistry};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tutti_rpc::{
    endpoint_pair, port_pair, Endpoint, Handler, Incoming, Port, Responder, RpcFault, RpcMethod,
};

/// A message on an encoder's frame port.
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderFrame {
    /// Planar samples, one `Vec` per channel.
    Samples(Vec<Vec<f32>>),
    /// One render quantum passed with no input attached.
    Gap,
    /// No more frames follow.
    End,
}

/// Sending side of a frame port, handed to a capture node.
pub type FramePort = Endpoint<EncoderFrame, ()>;

type FrameSink = Endpoint<(), EncoderFrame>;

/// Calls understood by the broker.
#[derive(Debug)]
pub enum BrokerRequest {
    /// Create an encoder. Replies with [`BrokerReply::FramePort`].
    Instantiate {
        encoder_id: u64,
        mime_type: String,
        sample_rate: u32,
        channel_count: u16,
    },
    /// Collect output. With a timeslice the broker waits that long and
    /// returns partial output; without one it waits for the frame port to
    /// end, finalizes and forgets the encoder.
    Encode {
        encoder_id: u64,
        timeslice: Option<Duration>,
    },
    /// Drop an encoder without finalizing it. Replies with
    /// [`BrokerReply::Forgotten`], `false` if no such encoder was held.
    Forget { encoder_id: u64 },
    /// Serve another client port directly.
    Register { port: BrokerPort },
    /// List supported MIME types.
    Characterize,
}

impl RpcMethod for BrokerRequest {
    fn method(&self) -> &'static str {
        match self {
            BrokerRequest::Instantiate { .. } => "instantiate",
            BrokerRequest::Encode { .. } => "encode",
            BrokerRequest::Forget { .. } => "forget",
            BrokerRequest::Register { .. } => "register",
            BrokerRequest::Characterize => "characterize",
        }
    }
}

#[derive(Debug)]
pub enum BrokerReply {
    FramePort(FramePort),
    Chunks(Vec<Bytes>),
    Forgotten(bool),
    Registered,
    MimeTypes(Vec<String>),
}

pub type BrokerPort = Port<BrokerRequest, BrokerReply>;

struct Instance {
    encoder: Arc<Mutex<Option<Box<dyn Encoder>>>>,
    drained: watch::Receiver<bool>,
}

struct BrokerState {
    registry: Arc<EncoderRegistry>,
    instances: Mutex<HashMap<u64, Instance>>,
}

impl BrokerState {
    fn instantiate(
        &self,
        encoder_id: u64,
        mime_type: &str,
        sample_rate: u32,
        channel_count: u16,
    ) -> std::result::Result<FramePort, RpcFault> {
        let factory = self.registry.get(mime_type).ok_or_else(|| {
            RpcFault::invalid_params(format!("The MIME type \"{mime_type}\" is not supported."))
        })?;

        let mut instances = self.instances.lock();
        if instances.contains_key(&encoder_id) {
            return Err(RpcFault::invalid_params(format!(
                "An encoder with the id {encoder_id} already exists."
            )));
        }

        let encoder = factory
            .create(sample_rate, channel_count)
            .map_err(|e| RpcFault::internal(e.to_string()))?;
        let encoder = Arc::new(Mutex::new(Some(encoder)));

        let (port, sink) = endpoint_pair::<EncoderFrame, ()>();
        let (drained_tx, drained_rx) = watch::channel(false);
        tokio::spawn(drain(encoder_id, sink, Arc::clone(&encoder), drained_tx));

        instances.insert(
            encoder_id,
            Instance {
                encoder,
                drained: drained_rx,
            },
        );
        tracing::debug!(encoder_id, mime_type, sample_rate, channel_count, "encoder instantiated");
        Ok(port)
    }

    async fn encode(
        &self,
        encoder_id: u64,
        timeslice: Option<Duration>,
    ) -> std::result::Result<Vec<Bytes>, RpcFault> {
        let unknown = || {
            RpcFault::invalid_params(format!("There is no encoder with the id {encoder_id}."))
        };

        match timeslice {
            Some(timeslice) => {
                let encoder = match self.instances.lock().get(&encoder_id) {
                    Some(instance) => Arc::clone(&instance.encoder),
                    None => return Err(unknown()),
                };
                tokio::time::sleep(timeslice).await;
                let mut encoder = encoder.lock();
                match encoder.as_mut() {
                    Some(encoder) => encoder
                        .flush_partial()
                        .map_err(|e| RpcFault::internal(e.to_string())),
                    // Finalized while we slept.
                    None => Ok(Vec::new()),
                }
            }
            None => {
                let mut drained = match self.instances.lock().get(&encoder_id) {
                    Some(instance) => instance.drained.clone(),
                    None => return Err(unknown()),
                };
                // A closed sender means the drain task is gone, which only
                // happens after it has drained.
                let _ = drained.wait_for(|done| *done).await;

                let instance = self.instances.lock().remove(&encoder_id).ok_or_else(unknown)?;
                let encoder = instance.encoder.lock().take().ok_or_else(unknown)?;
                let chunks = encoder
                    .finish()
                    .map_err(|e| RpcFault::internal(e.to_string()))?;
                tracing::debug!(encoder_id, chunks = chunks.len(), "encoder finalized");
                Ok(chunks)
            }
        }
    }
}

impl BrokerState {
    fn forget(&self, encoder_id: u64) -> bool {
        let Some(instance) = self.instances.lock().remove(&encoder_id) else {
            return false;
        };
        // The drain task keeps running until the frame port closes, but
        // has nothing left to feed.
        instance.encoder.lock().take();
        tracing::debug!(encoder_id, "encoder forgotten");
        true
    }
}

async fn drain(
    encoder_id: u64,
    mut sink: FrameSink,
    encoder: Arc<Mutex<Option<Box<dyn Encoder>>>>,
    drained: watch::Sender<bool>,
) {
    let mut gaps = 0u64;
    while let Some(frame) = sink.recv().await {
        match frame {
            EncoderFrame::Samples(channels) => {
                if let Some(encoder) = encoder.lock().as_mut() {
                    if let Err(e) = encoder.push_frames(&channels) {
                        tracing::error!(encoder_id, error = %e, "encoder rejected frames");
                    }
                }
            }
            EncoderFrame::Gap => gaps += 1,
            EncoderFrame::End => break,
        }
    }
    if gaps > 0 {
        tracing::debug!(encoder_id, gaps, "input was detached for some quanta");
    }
    let _ = drained.send(true);
}

struct BrokerHandler {
    state: Arc<BrokerState>,
}

impl Handler<BrokerRequest, BrokerReply> for BrokerHandler {
    fn handle(&mut self, call: BrokerRequest, reply: Responder<BrokerRequest, BrokerReply>) {
        match call {
            BrokerRequest::Characterize => {
                reply.resolve(BrokerReply::MimeTypes(self.state.registry.mime_types()));
            }
            BrokerRequest::Instantiate {
                encoder_id,
                mime_type,
                sample_rate,
                channel_count,
            } => match self
                .state
                .instantiate(encoder_id, &mime_type, sample_rate, channel_count)
            {
                Ok(port) => reply.resolve(BrokerReply::FramePort(port)),
                Err(fault) => reply.reject(fault),
            },
            BrokerRequest::Encode {
                encoder_id,
                timeslice,
            } => {
                let state = Arc::clone(&self.state);
                tokio::spawn(async move {
                    match state.encode(encoder_id, timeslice).await {
                        Ok(chunks) => reply.resolve(BrokerReply::Chunks(chunks)),
                        Err(fault) => reply.reject(fault),
                    }
                });
            }
            BrokerRequest::Forget { encoder_id } => {
                reply.resolve(BrokerReply::Forgotten(self.state.forget(encoder_id)));
            }
            BrokerRequest::Register { port } => {
                let state = Arc::clone(&self.state);
                tokio::spawn(serve(Incoming::from_port(port), state));
                reply.resolve(BrokerReply::Registered);
            }
        }
    }
}

async fn serve(mut incoming: Incoming<BrokerRequest, BrokerReply>, state: Arc<BrokerState>) {
    let mut handler = BrokerHandler { state };
    incoming.serve(&mut handler).await;
}

/// The broker thread and the port to reach it.
pub(crate) struct BrokerRealm {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BrokerRealm {
    /// Spawn the broker. Returns the realm and the client side of its port.
    pub(crate) fn spawn(registry: Arc<EncoderRegistry>) -> Result<(Self, BrokerPort)> {
        let (client, server) = port_pair::<BrokerRequest, BrokerReply>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let handle = thread::Builder::new()
            .name("tutti-encoder-broker".into())
            .spawn(move || {
                let state = Arc::new(BrokerState {
                    registry,
                    instances: Mutex::new(HashMap::new()),
                });
                runtime.block_on(async move {
                    tokio::select! {
                        _ = serve(Incoming::from_port(server), state) => {}
                        _ = shutdown_rx => {}
                    }
                });
                tracing::debug!("encoder broker stopped");
            })?;

        tracing::info!("encoder broker started");
        Ok((
            Self {
                shutdown: Some(shutdown_tx),
                handle: Some(handle),
            },
            client,
        ))
    }

    pub(crate) fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("encoder broker panicked");
            }
        }
    }
}

impl Drop for BrokerRealm {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reject a reply variant that does not belong to `method`.
pub(crate) fn unexpected(method: &'static str) -> RecorderError {
    RecorderError::UnexpectedReply(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::CONTAINER_MIME_TYPE;
    use tutti_demux::Demuxer;
    use tutti_rpc::{ErrorCode, RpcChannel};

    fn broker() -> (BrokerRealm, RpcChannel<BrokerRequest, BrokerReply>) {
        let (realm, port) = BrokerRealm::spawn(Arc::new(EncoderRegistry::default())).unwrap();
        let (channel, _incoming) = RpcChannel::connect(port);
        (realm, channel)
    }

    async fn instantiate(
        channel: &RpcChannel<BrokerRequest, BrokerReply>,
        encoder_id: u64,
        mime_type: &str,
    ) -> tutti_rpc::Result<BrokerReply> {
        channel
            .call(BrokerRequest::Instantiate {
                encoder_id,
                mime_type: mime_type.into(),
                sample_rate: 48000,
                channel_count: 1,
            })
            .await
    }

    #[tokio::test]
    async fn test_characterize() {
        let (_realm, channel) = broker();
        match channel.call(BrokerRequest::Characterize).await.unwrap() {
            BrokerReply::MimeTypes(types) => {
                assert!(types.contains(&"audio/wav".to_string()));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_mime_type() {
        let (_realm, channel) = broker();
        let err = instantiate(&channel, 1, "video/mp4").await.unwrap_err();
        assert_eq!(err.fault_code(), Some(ErrorCode::InvalidParams));
    }

    #[tokio::test]
    async fn test_final_encode_waits_for_end() {
        let (_realm, channel) = broker();
        let BrokerReply::FramePort(port) = instantiate(&channel, 7, CONTAINER_MIME_TYPE).await.unwrap()
        else {
            panic!("expected frame port");
        };

        port.send(EncoderFrame::Samples(vec![vec![0.25, 0.5]])).unwrap();
        port.send(EncoderFrame::Gap).unwrap();

        let pending = {
            let channel = channel.clone();
            tokio::spawn(async move {
                channel
                    .call(BrokerRequest::Encode {
                        encoder_id: 7,
                        timeslice: None,
                    })
                    .await
            })
        };
        port.send(EncoderFrame::End).unwrap();
        drop(port);

        let BrokerReply::Chunks(chunks) = pending.await.unwrap().unwrap() else {
            panic!("expected chunks");
        };
        let mut demuxer = Demuxer::new(1).unwrap();
        let blocks: Vec<_> = chunks
            .into_iter()
            .flat_map(|chunk| demuxer.push(chunk).collect::<Vec<_>>())
            .collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].channel(0).unwrap(), &[0.25, 0.5]);
        assert!(blocks[1].is_end_of_stream());

        // The encoder is forgotten after finalizing.
        let err = channel
            .call(BrokerRequest::Encode {
                encoder_id: 7,
                timeslice: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.fault_code(), Some(ErrorCode::InvalidParams));
    }

    #[tokio::test]
    async fn test_timeslice_returns_partial_output() {
        let (_realm, channel) = broker();
        let BrokerReply::FramePort(port) = instantiate(&channel, 3, "audio/wav").await.unwrap() else {
            panic!("expected frame port");
        };
        port.send(EncoderFrame::Samples(vec![vec![0.0; 4]])).unwrap();

        let reply = channel
            .call(BrokerRequest::Encode {
                encoder_id: 3,
                timeslice: Some(Duration::from_millis(20)),
            })
            .await
            .unwrap();
        let BrokerReply::Chunks(chunks) = reply else {
            panic!("expected chunks");
        };
        assert_eq!(&chunks[0][..4], b"RIFF");
        assert_eq!(chunks.iter().map(Bytes::len).sum::<usize>(), 44 + 8);
    }

    #[tokio::test]
    async fn test_forget_drops_encoder() {
        let (_realm, channel) = broker();
        let BrokerReply::FramePort(port) = instantiate(&channel, 5, CONTAINER_MIME_TYPE).await.unwrap()
        else {
            panic!("expected frame port");
        };
        port.send(EncoderFrame::Samples(vec![vec![0.5; 8]])).unwrap();

        let reply = channel
            .call(BrokerRequest::Forget { encoder_id: 5 })
            .await
            .unwrap();
        assert!(matches!(reply, BrokerReply::Forgotten(true)));

        let err = channel
            .call(BrokerRequest::Encode {
                encoder_id: 5,
                timeslice: Some(Duration::from_millis(1)),
            })
            .await
            .unwrap_err();
        assert_eq!(err.fault_code(), Some(ErrorCode::InvalidParams));

        // The id is free again.
        assert!(matches!(
            instantiate(&channel, 5, CONTAINER_MIME_TYPE).await.unwrap(),
            BrokerReply::FramePort(_)
        ));
        let reply = channel
            .call(BrokerRequest::Forget { encoder_id: 99 })
            .await
            .unwrap();
        assert!(matches!(reply, BrokerReply::Forgotten(false)));
    }

    #[tokio::test]
    async fn test_register_serves_direct_port() {
        let (_realm, channel) = broker();
        let (client, server) = port_pair::<BrokerRequest, BrokerReply>();
        let reply = channel
            .call(BrokerRequest::Register { port: server })
            .await
            .unwrap();
        assert!(matches!(reply, BrokerReply::Registered));

        let (direct, _incoming) = RpcChannel::connect(client);
        assert!(matches!(
            direct.call(BrokerRequest::Characterize).await.unwrap(),
            BrokerReply::MimeTypes(_)
        ));
    }
}
