//! The recorder façade.
//!
//! A [`RecorderSession`] drives one capture from start to stop. State
//! changes are checked and applied synchronously by the public methods; the
//! work they imply runs on a driver task that talks to the host's realms and
//! reports progress as [`RecorderEvent`]s.

use crate::broker::{unexpected, BrokerReply, BrokerRequest, FramePort};
use crate::config::{RecorderConfig, DEFAULT_CHANNEL_COUNT};
use crate::error::{DeviceError, RecorderError, Result, StateError};
use crate::events::{Blob, RecorderEvent};
use crate::host::{BrokerChannel, HostLease, RecorderHost};
use crate::input::MediaInput;
use crate::render::{CaptureNode, NodeId, NodeRequest, NodeState, RenderHandle};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tutti_rpc::{RpcChannel, RpcError};

/// Public recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordingState {
    Inactive = 0,
    Recording = 1,
    Paused = 2,
    /// Terminal.
    Stopped = 3,
}

impl From<u8> for RecordingState {
    fn from(value: u8) -> Self {
        match value {
            1 => RecordingState::Recording,
            2 => RecordingState::Paused,
            3 => RecordingState::Stopped,
            _ => RecordingState::Inactive,
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordingState::Inactive => "inactive",
            RecordingState::Recording => "recording",
            RecordingState::Paused => "paused",
            RecordingState::Stopped => "stopped",
        })
    }
}

/// Unique session identifier, also used as the encoder id on the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCommand {
    Pause,
    Resume,
    Stop,
}

struct Shared {
    state: AtomicU8,
    stopping: AtomicBool,
}

impl Shared {
    fn state(&self) -> RecordingState {
        RecordingState::from(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RecordingState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(
        &self,
        operation: &'static str,
        from: RecordingState,
        to: RecordingState,
    ) -> std::result::Result<(), StateError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(StateError::new(operation, self.state()));
        }
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|current| StateError::new(operation, RecordingState::from(current)))
    }
}

/// Records a [`MediaInput`] into encoded chunks.
///
/// ```ignore
/// let host = RecorderHost::default();
/// let input = MediaInput::new(48000, 2);
/// let session = RecorderSession::new(host, input.clone(), RecorderConfig::default())?;
/// let mut events = session.events().unwrap();
///
/// session.start(Some(Duration::from_millis(250)))?;
/// // ... push blocks into `input` ...
/// session.stop()?;
///
/// while let Some(event) = events.recv().await {
///     if let RecorderEvent::DataAvailable(blob) = event { /* ... */ }
/// }
/// ```
///
/// Dropping a session that is still recording stops it; the final events
/// are still delivered to an outstanding [`events`](Self::events) receiver.
pub struct RecorderSession {
    id: SessionId,
    host: RecorderHost,
    input: MediaInput,
    config: RecorderConfig,
    mime_type: String,
    shared: Arc<Shared>,
    commands: Mutex<Option<UnboundedSender<SessionCommand>>>,
    events_tx: UnboundedSender<RecorderEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<RecorderEvent>>>,
}

impl RecorderSession {
    /// Create an inactive session. Fails if the configured MIME type has no
    /// encoder on `host`.
    pub fn new(host: RecorderHost, input: MediaInput, config: RecorderConfig) -> Result<Self> {
        let mime_type = config
            .mime_type
            .clone()
            .unwrap_or_else(|| host.config().default_mime_type.clone());
        if !host.is_type_supported(&mime_type) {
            return Err(RecorderError::UnsupportedMimeType(mime_type));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            id: SessionId::generate(),
            host,
            input,
            config,
            mime_type,
            shared: Arc::new(Shared {
                state: AtomicU8::new(RecordingState::Inactive as u8),
                stopping: AtomicBool::new(false),
            }),
            commands: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> RecordingState {
        self.shared.state()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn input(&self) -> &MediaInput {
        &self.input
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn events(&self) -> Option<UnboundedReceiver<RecorderEvent>> {
        self.events_rx.lock().take()
    }

    /// Begin recording. With a timeslice, encoded output is delivered every
    /// `timeslice`; otherwise it is all delivered on stop.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self, timeslice: Option<Duration>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RecorderError::Runtime(e.to_string()))?;
        self.shared
            .transition("start", RecordingState::Inactive, RecordingState::Recording)?;

        let (tx, rx) = mpsc::unbounded_channel();
        *self.commands.lock() = Some(tx);

        let driver = Driver {
            id: self.id,
            host: self.host.clone(),
            input: self.input.clone(),
            config: self.config.clone(),
            mime_type: self.mime_type.clone(),
            shared: Arc::clone(&self.shared),
            events: self.events_tx.clone(),
        };
        runtime.spawn(driver.run(timeslice, rx));
        tracing::debug!(session = self.id.0, ?timeslice, "recorder start requested");
        Ok(())
    }

    pub fn pause(&self) -> std::result::Result<(), StateError> {
        self.shared
            .transition("pause", RecordingState::Recording, RecordingState::Paused)?;
        self.command(SessionCommand::Pause);
        Ok(())
    }

    pub fn resume(&self) -> std::result::Result<(), StateError> {
        self.shared
            .transition("resume", RecordingState::Paused, RecordingState::Recording)?;
        self.command(SessionCommand::Resume);
        Ok(())
    }

    /// Request the final output. The state becomes
    /// [`Stopped`](RecordingState::Stopped) once every chunk has been
    /// delivered, right before the `Stop` event.
    pub fn stop(&self) -> std::result::Result<(), StateError> {
        let state = self.state();
        if matches!(state, RecordingState::Inactive | RecordingState::Stopped)
            || self.shared.stopping.swap(true, Ordering::AcqRel)
        {
            return Err(StateError::new("stop", state));
        }
        self.command(SessionCommand::Stop);
        Ok(())
    }

    fn command(&self, command: SessionCommand) {
        if let Some(tx) = self.commands.lock().as_ref() {
            // The driver is gone once the session has ended.
            let _ = tx.send(command);
        }
    }
}

impl fmt::Debug for RecorderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderSession")
            .field("id", &self.id.0)
            .field("state", &self.state())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

type PartialEncode =
    Pin<Box<dyn Future<Output = std::result::Result<BrokerReply, RpcError>> + Send>>;

/// Detaches a node from the render realm when dropped.
struct Attached<'a> {
    render: &'a RenderHandle,
    id: NodeId,
}

impl Drop for Attached<'_> {
    fn drop(&mut self) {
        self.render.detach(self.id);
    }
}

struct Driver {
    id: SessionId,
    host: RecorderHost,
    input: MediaInput,
    config: RecorderConfig,
    mime_type: String,
    shared: Arc<Shared>,
    events: UnboundedSender<RecorderEvent>,
}

impl Driver {
    async fn run(self, timeslice: Option<Duration>, mut commands: UnboundedReceiver<SessionCommand>) {
        let outcome = self.record(timeslice, &mut commands).await;
        self.shared.set_state(RecordingState::Stopped);
        match outcome {
            Ok(()) => {
                tracing::info!(session = self.id.0, "recording stopped");
                self.emit(RecorderEvent::Stop);
            }
            Err(e) => {
                tracing::error!(session = self.id.0, error = %e, "recording failed");
                self.emit(RecorderEvent::Error(e));
            }
        }
    }

    fn emit(&self, event: RecorderEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    async fn record(
        &self,
        timeslice: Option<Duration>,
        commands: &mut UnboundedReceiver<SessionCommand>,
    ) -> Result<()> {
        let revision = self.input.track_revision();
        let encoder_id = self.id.0;
        let sample_rate = self.input.sample_rate();
        let channel_count = self.input.channel_count().unwrap_or(DEFAULT_CHANNEL_COUNT);

        let lease = self.host.acquire()?;
        let broker = lease.connect_broker().await?;
        let frames = match broker
            .call(BrokerRequest::Instantiate {
                encoder_id,
                mime_type: self.mime_type.clone(),
                sample_rate,
                channel_count,
            })
            .await?
        {
            BrokerReply::FramePort(port) => port,
            _ => return Err(unexpected("instantiate")),
        };

        // Output produced but not yet delivered.
        let mut held: Vec<Bytes> = Vec::new();
        let outcome = self
            .capture(&lease, &broker, frames, revision, channel_count, timeslice, commands, &mut held)
            .await;
        if outcome.is_err() {
            self.abandon(&broker, held).await;
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn capture(
        &self,
        lease: &HostLease,
        broker: &BrokerChannel,
        frames: FramePort,
        revision: u64,
        channel_count: u16,
        timeslice: Option<Duration>,
        commands: &mut UnboundedReceiver<SessionCommand>,
        held: &mut Vec<Bytes>,
    ) -> Result<()> {
        let encoder_id = self.id.0;

        let (node, node_port) = CaptureNode::new(
            &self.input,
            channel_count,
            lease.config().render_quantum,
            self.config.input_queue_capacity,
        );
        let node_state = node.state_handle();
        let node_id = node.id();
        if !lease
            .render()
            .attach(node, self.config.effective_warm_up_frames())
        {
            return Err(RpcError::Disconnected.into());
        }
        let _attached = Attached {
            render: lease.render(),
            id: node_id,
        };

        let (control, _incoming) = RpcChannel::connect(node_port);
        control.call(NodeRequest::Record { port: frames }).await?;
        tracing::info!(
            session = self.id.0,
            mime_type = %self.mime_type,
            sample_rate = self.input.sample_rate(),
            channel_count,
            "recording started"
        );
        self.emit(RecorderEvent::Start);

        // Output produced before the node sees its first input stays held.
        let mut partial = timeslice.map(|t| partial_encode(broker, encoder_id, t));
        let mut watchdog =
            tokio::time::interval(self.config.watchdog_interval.max(Duration::from_millis(1)));
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let fault = loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(SessionCommand::Pause) => {
                        control.call(NodeRequest::Pause).await?;
                        self.emit(RecorderEvent::Pause);
                    }
                    Some(SessionCommand::Resume) => {
                        control.call(NodeRequest::Resume).await?;
                        self.emit(RecorderEvent::Resume);
                    }
                    Some(SessionCommand::Stop) | None => break None,
                },

                reply = in_flight(&mut partial) => {
                    held.extend(chunks(reply?)?);
                    let warming = NodeState::from(node_state.load(Ordering::Acquire)) == NodeState::Active;
                    if !warming && !held.is_empty() {
                        let parts = std::mem::take(held);
                        self.emit(RecorderEvent::DataAvailable(Blob::new(
                            parts,
                            self.mime_type.clone(),
                        )));
                    }
                    partial = timeslice.map(|t| partial_encode(broker, encoder_id, t));
                }

                _ = watchdog.tick() => {
                    if self.input.track_revision() != revision {
                        tracing::warn!(session = self.id.0, "input tracks changed, forcing stop");
                        break Some(RecorderError::from(DeviceError::TracksChanged));
                    }
                }
            }
        };

        self.shared.stopping.store(true, Ordering::Release);
        self.finish(broker, &control, partial, held).await?;

        match fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Drain the in-flight partial encode, end the frame stream and deliver
    /// everything that is left as one blob.
    async fn finish(
        &self,
        broker: &BrokerChannel,
        control: &RpcChannel<NodeRequest, ()>,
        partial: Option<PartialEncode>,
        held: &mut Vec<Bytes>,
    ) -> Result<()> {
        if let Some(in_flight) = partial {
            held.extend(chunks(in_flight.await?)?);
        }
        control.call(NodeRequest::Stop).await?;
        let last = broker
            .call(BrokerRequest::Encode {
                encoder_id: self.id.0,
                timeslice: None,
            })
            .await?;
        held.extend(chunks(last)?);

        let blob = Blob::new(std::mem::take(held), self.mime_type.clone());
        tracing::debug!(session = self.id.0, bytes = blob.size(), "final chunk");
        self.emit(RecorderEvent::DataAvailable(blob));
        Ok(())
    }

    /// Release the broker's encoder after a failure and deliver whatever
    /// output was still held.
    async fn abandon(&self, broker: &BrokerChannel, held: Vec<Bytes>) {
        match broker
            .call(BrokerRequest::Forget {
                encoder_id: self.id.0,
            })
            .await
        {
            Ok(BrokerReply::Forgotten(released)) => {
                tracing::debug!(session = self.id.0, released, "encoder released after failure");
            }
            Ok(_) => tracing::warn!(session = self.id.0, "unexpected reply to forget"),
            Err(e) => tracing::warn!(session = self.id.0, error = %e, "could not release encoder"),
        }
        if !held.is_empty() {
            self.emit(RecorderEvent::DataAvailable(Blob::new(
                held,
                self.mime_type.clone(),
            )));
        }
    }
}

fn partial_encode(broker: &BrokerChannel, encoder_id: u64, timeslice: Duration) -> PartialEncode {
    let broker = broker.clone();
    Box::pin(async move {
        broker
            .call(BrokerRequest::Encode {
                encoder_id,
                timeslice: Some(timeslice),
            })
            .await
    })
}

async fn in_flight(
    partial: &mut Option<PartialEncode>,
) -> std::result::Result<BrokerReply, RpcError> {
    match partial {
        Some(encode) => encode.await,
        None => std::future::pending().await,
    }
}

fn chunks(reply: BrokerReply) -> Result<Vec<Bytes>> {
    match reply {
        BrokerReply::Chunks(chunks) => Ok(chunks),
        _ => Err(unexpected("encode")),
    }
}
