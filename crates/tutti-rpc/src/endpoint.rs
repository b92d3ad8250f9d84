//! In-process message endpoints.

use crate::error::{Result, RpcError};
use crate::frame::Frame;
use std::fmt;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// One side of a FIFO message pair.
///
/// Sends `S`, receives `R`. Moving an endpoint into a message transfers it.
pub struct Endpoint<S, R> {
    tx: UnboundedSender<S>,
    rx: UnboundedReceiver<R>,
}

/// A port carrying RPC frames in both directions.
pub type Port<Q, P> = Endpoint<Frame<Q, P>, Frame<Q, P>>;

/// Create two connected endpoints.
pub fn endpoint_pair<A, B>() -> (Endpoint<A, B>, Endpoint<B, A>) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        Endpoint { tx: a_tx, rx: b_rx },
        Endpoint { tx: b_tx, rx: a_rx },
    )
}

/// Create two connected RPC ports.
pub fn port_pair<Q, P>() -> (Port<Q, P>, Port<Q, P>) {
    endpoint_pair()
}

impl<S, R> Endpoint<S, R> {
    pub fn send(&self, message: S) -> Result<()> {
        self.tx.send(message).map_err(|_| RpcError::Disconnected)
    }

    /// `None` once the peer is gone and everything it sent was received.
    pub async fn recv(&mut self) -> Option<R> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<Option<R>> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RpcError::Disconnected),
        }
    }

    /// Blocking receive. Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<R> {
        self.rx.blocking_recv()
    }

    /// Whether the peer stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Stop receiving. Messages already queued can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn into_parts(self) -> (UnboundedSender<S>, UnboundedReceiver<R>) {
        (self.tx, self.rx)
    }
}

impl<S, R> fmt::Debug for Endpoint<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("closed", &self.is_closed())
            .finish()
    }
}
