//! Capture node: forwards input quanta to an encoder's frame port.

use crate::broker::{EncoderFrame, FramePort};
use crate::input::{AudioBlock, MediaInput};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tutti_rpc::{ErrorCode, Handler, Incoming, Port, Responder, RpcFault, RpcMethod};

/// Unique identifier for a capture node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Capture node state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    /// Not connected to an encoder
    Inactive = 0,
    /// Armed, waiting for the first non-empty input
    Active = 1,
    Recording = 2,
    Paused = 3,
}

impl From<u8> for NodeState {
    fn from(value: u8) -> Self {
        match value {
            1 => NodeState::Active,
            2 => NodeState::Recording,
            3 => NodeState::Paused,
            _ => NodeState::Inactive,
        }
    }
}

/// Control messages for a capture node.
#[derive(Debug)]
pub enum NodeRequest {
    Record { port: FramePort },
    Pause,
    Resume,
    Stop,
}

impl RpcMethod for NodeRequest {
    fn method(&self) -> &'static str {
        match self {
            NodeRequest::Record { .. } => "record",
            NodeRequest::Pause => "pause",
            NodeRequest::Resume => "resume",
            NodeRequest::Stop => "stop",
        }
    }
}

pub type NodePort = Port<NodeRequest, ()>;

fn invalid_state() -> RpcFault {
    RpcFault::new(
        ErrorCode::InternalError,
        "The internal state does not allow to process the given message.",
    )
}

/// State and buffers of a node, driven by its control messages.
struct NodeCore {
    id: NodeId,
    state: Arc<AtomicU8>,
    channel_count: usize,
    quantum: usize,
    input: MediaInput,
    blocks: Receiver<AudioBlock>,
    pending: Vec<Vec<f32>>,
    port: Option<FramePort>,
    forwarded: u64,
}

impl NodeCore {
    fn state(&self) -> NodeState {
        NodeState::from(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn pending_frames(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    fn take_input(&mut self) -> bool {
        let mut received = false;
        while let Ok(block) = self.blocks.try_recv() {
            let frames = block.iter().map(Vec::len).max().unwrap_or(0);
            if frames == 0 {
                continue;
            }
            received = true;
            for (channel, pending) in self.pending.iter_mut().enumerate() {
                match block.get(channel) {
                    Some(samples) => {
                        pending.extend_from_slice(samples);
                        pending.resize(pending.len() + frames - samples.len(), 0.0);
                    }
                    None => pending.resize(pending.len() + frames, 0.0),
                }
            }
        }
        received
    }

    fn discard_blocks(&mut self) {
        while self.blocks.try_recv().is_ok() {}
    }

    fn discard_input(&mut self) {
        self.discard_blocks();
        for channel in &mut self.pending {
            channel.clear();
        }
    }

    fn send(&mut self, frame: EncoderFrame) {
        let Some(port) = &self.port else {
            return;
        };
        if port.send(frame).is_err() {
            tracing::warn!(node = self.id.0, "encoder frame port closed");
            self.port = None;
        }
    }

    /// Forward whole quanta. `flush` also forwards a trailing partial one.
    fn forward(&mut self, flush: bool) {
        while self.pending_frames() >= self.quantum
            || (flush && self.pending_frames() > 0)
        {
            let frames = self.pending_frames().min(self.quantum);
            let quantum: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..frames).collect())
                .collect();
            self.forwarded += frames as u64;
            self.send(EncoderFrame::Samples(quantum));
        }
    }

    fn render(&mut self) {
        match self.state() {
            NodeState::Inactive => self.discard_input(),
            NodeState::Paused => self.discard_blocks(),
            NodeState::Active => {
                if self.take_input() {
                    self.set_state(NodeState::Recording);
                    tracing::debug!(node = self.id.0, "capture node recording");
                    self.forward(false);
                }
            }
            NodeState::Recording => {
                let received = self.take_input();
                if !received && !self.input.has_tracks() {
                    self.send(EncoderFrame::Gap);
                }
                self.forward(false);
            }
        }
    }

    fn record(&mut self, port: FramePort) -> Result<(), RpcFault> {
        if self.state() != NodeState::Inactive {
            return Err(invalid_state());
        }
        // Nothing captured before arming counts.
        self.discard_input();
        self.port = Some(port);
        self.set_state(NodeState::Active);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RpcFault> {
        match self.state() {
            NodeState::Active | NodeState::Recording | NodeState::Paused => {
                if self.state() != NodeState::Paused {
                    self.take_input();
                }
                self.forward(true);
                self.send(EncoderFrame::End);
                self.port = None;
                self.set_state(NodeState::Inactive);
                tracing::debug!(node = self.id.0, frames = self.forwarded, "capture node stopped");
                Ok(())
            }
            NodeState::Inactive => Err(invalid_state()),
        }
    }
}

impl Handler<NodeRequest, ()> for NodeCore {
    fn handle(&mut self, call: NodeRequest, reply: Responder<NodeRequest, ()>) {
        let outcome = match call {
            NodeRequest::Record { port } => self.record(port),
            NodeRequest::Pause => match self.state() {
                NodeState::Active | NodeState::Recording => {
                    // Keep what arrived before the pause.
                    self.take_input();
                    self.set_state(NodeState::Paused);
                    Ok(())
                }
                _ => Err(invalid_state()),
            },
            NodeRequest::Resume => match self.state() {
                NodeState::Paused => {
                    self.discard_blocks();
                    self.set_state(NodeState::Active);
                    Ok(())
                }
                _ => Err(invalid_state()),
            },
            NodeRequest::Stop => self.stop(),
        };
        match outcome {
            Ok(()) => reply.resolve(()),
            Err(fault) => reply.reject(fault),
        }
    }
}

/// A node in the render realm.
///
/// Control messages arrive over an RPC port and are handled at the start of
/// each render pass. Input is consumed in quanta of a fixed frame count.
pub struct CaptureNode {
    core: NodeCore,
    control: Incoming<NodeRequest, ()>,
}

impl CaptureNode {
    /// Create a node reading `input`. Returns the node and the port that
    /// controls it.
    pub fn new(
        input: &MediaInput,
        channel_count: u16,
        quantum: usize,
        queue_capacity: usize,
    ) -> (Self, NodePort) {
        let (client, server) = tutti_rpc::port_pair();
        let channel_count = channel_count.max(1) as usize;
        let node = Self {
            core: NodeCore {
                id: NodeId::generate(),
                state: Arc::new(AtomicU8::new(NodeState::Inactive as u8)),
                channel_count,
                quantum: quantum.max(1),
                input: input.clone(),
                blocks: input.subscribe(queue_capacity),
                pending: vec![Vec::new(); channel_count],
                port: None,
                forwarded: 0,
            },
            control: Incoming::from_port(server),
        };
        (node, client)
    }

    pub fn id(&self) -> NodeId {
        self.core.id
    }

    pub fn state(&self) -> NodeState {
        self.core.state()
    }

    /// Shared view of the state, readable from other threads.
    pub fn state_handle(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.core.state)
    }

    pub fn channel_count(&self) -> usize {
        self.core.channel_count
    }

    /// Frames sent to the encoder so far.
    pub fn frames_forwarded(&self) -> u64 {
        self.core.forwarded
    }

    /// Run silent quanta through the node before it is armed; the output is
    /// discarded. Returns the number of quanta rendered.
    pub fn warm_up(&mut self, frames: usize) -> usize {
        let quanta = frames.div_ceil(self.core.quantum);
        let silence = vec![0.0f32; self.core.quantum];
        for _ in 0..quanta {
            for channel in &mut self.core.pending {
                channel.extend_from_slice(&silence);
            }
            // Inactive: nothing leaves the node.
            self.core.render();
        }
        for channel in &mut self.core.pending {
            channel.reserve(self.core.quantum * 2);
        }
        quanta
    }

    /// One render pass. Returns `false` once the control port is gone and the
    /// node should be removed.
    pub fn process(&mut self) -> bool {
        let connected = match self.control.poll(&mut self.core) {
            Ok(_) => true,
            Err(_) => {
                if self.core.state() != NodeState::Inactive {
                    tracing::warn!(node = self.core.id.0, "control port lost, stopping");
                    let _ = self.core.stop();
                }
                false
            }
        };
        self.core.render();
        connected
    }
}

impl std::fmt::Debug for CaptureNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureNode")
            .field("id", &self.core.id)
            .field("state", &self.core.state())
            .field("channel_count", &self.core.channel_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutti_rpc::{endpoint_pair, Frame};

    struct Harness {
        node: CaptureNode,
        control: NodePort,
        frames: tutti_rpc::Endpoint<(), EncoderFrame>,
        next_id: u64,
    }

    impl Harness {
        fn new(input: &MediaInput, quantum: usize) -> Self {
            let (node, control) = CaptureNode::new(input, 2, quantum, 64);
            let (port, frames) = endpoint_pair::<EncoderFrame, ()>();
            let mut harness = Self {
                node,
                control,
                frames,
                next_id: 0,
            };
            harness.call(NodeRequest::Record { port }).unwrap();
            harness
        }

        fn call(&mut self, call: NodeRequest) -> Result<(), RpcFault> {
            let id = self.next_id;
            self.next_id += 1;
            self.control
                .send(Frame::Request { id: Some(id), call })
                .unwrap();
            self.node.process();
            match self.control.try_recv().unwrap() {
                Some(Frame::Response { id: reply, outcome }) => {
                    assert_eq!(reply, id);
                    outcome
                }
                other => panic!("expected response, got {other:?}"),
            }
        }

        fn frames(&mut self) -> Vec<EncoderFrame> {
            let mut frames = Vec::new();
            while let Ok(Some(frame)) = self.frames.try_recv() {
                frames.push(frame);
            }
            frames
        }
    }

    #[test]
    fn test_state_from_u8() {
        assert_eq!(NodeState::from(2), NodeState::Recording);
        assert_eq!(NodeState::from(200), NodeState::Inactive);
    }

    #[test]
    fn test_first_input_starts_recording() {
        let input = MediaInput::new(48000, 2);
        let mut h = Harness::new(&input, 4);
        assert_eq!(h.node.state(), NodeState::Active);

        h.node.process();
        assert_eq!(h.node.state(), NodeState::Active);

        input.push(vec![vec![1.0; 6], vec![2.0; 6]]);
        h.node.process();
        assert_eq!(h.node.state(), NodeState::Recording);

        let frames = h.frames();
        assert_eq!(
            frames,
            vec![EncoderFrame::Samples(vec![vec![1.0; 4], vec![2.0; 4]])]
        );
    }

    #[test]
    fn test_stop_flushes_partial_quantum_then_ends() {
        let input = MediaInput::new(48000, 2);
        let mut h = Harness::new(&input, 4);
        input.push(vec![vec![0.5; 3], vec![-0.5; 3]]);

        h.call(NodeRequest::Stop).unwrap();
        assert_eq!(h.node.state(), NodeState::Inactive);
        assert_eq!(
            h.frames(),
            vec![
                EncoderFrame::Samples(vec![vec![0.5; 3], vec![-0.5; 3]]),
                EncoderFrame::End
            ]
        );
        assert_eq!(h.node.frames_forwarded(), 3);
        // port closed
        assert_eq!(h.frames.try_recv(), Err(tutti_rpc::RpcError::Disconnected));
    }

    #[test]
    fn test_missing_channels_are_silent() {
        let input = MediaInput::new(48000, 1);
        let mut h = Harness::new(&input, 2);
        input.push(vec![vec![1.0, 1.0]]);
        h.node.process();
        assert_eq!(
            h.frames(),
            vec![EncoderFrame::Samples(vec![vec![1.0, 1.0], vec![0.0, 0.0]])]
        );
    }

    #[test]
    fn test_pause_discards_input() {
        let input = MediaInput::new(48000, 2);
        let mut h = Harness::new(&input, 2);
        input.push(vec![vec![1.0; 2], vec![1.0; 2]]);
        h.node.process();
        assert_eq!(h.frames().len(), 1);

        h.call(NodeRequest::Pause).unwrap();
        input.push(vec![vec![9.0; 2], vec![9.0; 2]]);
        h.node.process();
        assert!(h.frames().is_empty());

        h.call(NodeRequest::Resume).unwrap();
        assert_eq!(h.node.state(), NodeState::Active);
        input.push(vec![vec![3.0; 2], vec![3.0; 2]]);
        h.node.process();
        assert_eq!(
            h.frames(),
            vec![EncoderFrame::Samples(vec![vec![3.0; 2], vec![3.0; 2]])]
        );
    }

    #[test]
    fn test_invalid_transitions_fault() {
        let input = MediaInput::new(48000, 2);
        let (node, control) = CaptureNode::new(&input, 2, 4, 8);
        let mut h = Harness {
            node,
            control,
            frames: endpoint_pair::<(), EncoderFrame>().0,
            next_id: 0,
        };

        let fault = h.call(NodeRequest::Stop).unwrap_err();
        assert_eq!(fault.error_code(), Some(ErrorCode::InternalError));
        assert_eq!(
            fault.message,
            "The internal state does not allow to process the given message."
        );
        assert!(h.call(NodeRequest::Resume).is_err());
        assert!(h.call(NodeRequest::Pause).is_err());

        let (port, _frames) = endpoint_pair::<EncoderFrame, ()>();
        h.call(NodeRequest::Record { port }).unwrap();
        let (again, _frames) = endpoint_pair::<EncoderFrame, ()>();
        assert!(h.call(NodeRequest::Record { port: again }).is_err());
    }

    #[test]
    fn test_detached_input_sends_gaps_while_recording() {
        let input = MediaInput::new(48000, 2);
        let track = input.tracks()[0].id;
        let mut h = Harness::new(&input, 2);
        input.push(vec![vec![1.0; 2], vec![1.0; 2]]);
        h.node.process();
        h.frames();

        input.remove_track(track);
        h.node.process();
        assert_eq!(h.frames(), vec![EncoderFrame::Gap]);
    }

    #[test]
    fn test_warm_up_emits_nothing() {
        let input = MediaInput::new(48000, 2);
        let (mut node, _control) = CaptureNode::new(&input, 2, 128, 8);
        assert_eq!(node.warm_up(1024), 8);
        assert_eq!(node.warm_up(1025), 9);
        assert_eq!(node.frames_forwarded(), 0);
        assert_eq!(node.state(), NodeState::Inactive);
    }

    #[test]
    fn test_lost_control_port_stops_node() {
        let input = MediaInput::new(48000, 2);
        let h = Harness::new(&input, 4);
        input.push(vec![vec![1.0], vec![1.0]]);
        let Harness {
            mut node,
            control,
            mut frames,
            ..
        } = h;
        drop(control);
        assert!(!node.process());
        assert_eq!(node.state(), NodeState::Inactive);
        let mut received = Vec::new();
        while let Ok(Some(frame)) = frames.try_recv() {
            received.push(frame);
        }
        assert_eq!(received.last(), Some(&EncoderFrame::End));
    }
}
