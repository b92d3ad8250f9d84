//! Render realm thread.

use super::node::{CaptureNode, NodeId};
use crate::error::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Command sent to the render thread
enum RenderCommand {
    Attach { node: CaptureNode, warm_up: usize },
    Detach(NodeId),
    Shutdown,
}

/// Handle for attaching nodes to a running render realm.
#[derive(Clone)]
pub struct RenderHandle {
    commands: Sender<RenderCommand>,
    nodes: Arc<AtomicUsize>,
}

impl RenderHandle {
    /// Hand a node to the render thread. It is warmed up with `warm_up`
    /// silent frames before its first render pass.
    ///
    /// Returns `false` if the realm has shut down.
    pub fn attach(&self, node: CaptureNode, warm_up: usize) -> bool {
        self.commands
            .send(RenderCommand::Attach { node, warm_up })
            .is_ok()
    }

    pub fn detach(&self, id: NodeId) -> bool {
        self.commands.send(RenderCommand::Detach(id)).is_ok()
    }

    /// Nodes currently attached.
    pub fn node_count(&self) -> usize {
        self.nodes.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("nodes", &self.node_count())
            .finish()
    }
}

/// Owns the render thread.
///
/// Attached nodes are processed once per pass. A pass runs whenever a command
/// arrives, and at least once per `interval`.
pub struct RenderContext {
    handle: RenderHandle,
    thread: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl RenderContext {
    pub fn spawn(interval: Duration) -> Result<Self> {
        let (tx, rx) = unbounded();
        let nodes = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let nodes = Arc::clone(&nodes);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("tutti-render".into())
                .spawn(move || {
                    render_loop(rx, interval, &nodes);
                    running.store(false, Ordering::Release);
                })?
        };

        tracing::info!(?interval, "render realm started");
        Ok(Self {
            handle: RenderHandle {
                commands: tx,
                nodes,
            },
            thread: Some(thread),
            running,
        })
    }

    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&mut self) {
        let _ = self.handle.commands.send(RenderCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("render thread panicked");
            }
            tracing::debug!("render realm stopped");
        }
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_loop(rx: Receiver<RenderCommand>, interval: Duration, count: &AtomicUsize) {
    let mut nodes: Vec<CaptureNode> = Vec::new();

    loop {
        let mut command = match rx.recv_timeout(interval) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => return,
        };

        while let Some(cmd) = command.take() {
            match cmd {
                RenderCommand::Attach { mut node, warm_up } => {
                    let quanta = node.warm_up(warm_up);
                    tracing::debug!(node = node.id().0, quanta, "capture node attached");
                    nodes.push(node);
                }
                RenderCommand::Detach(id) => {
                    nodes.retain(|node| node.id() != id);
                }
                RenderCommand::Shutdown => return,
            }
            command = rx.try_recv().ok();
        }

        nodes.retain_mut(|node| {
            let keep = node.process();
            if !keep {
                tracing::debug!(node = node.id().0, "capture node released");
            }
            keep
        });
        count.store(nodes.len(), Ordering::Release);
    }
}
