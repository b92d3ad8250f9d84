//! Serving side of a port.

use crate::endpoint::Port;
use crate::error::{Result, RpcError, RpcFault};
use crate::frame::{Frame, RpcMethod};
use std::fmt;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Answers one call exactly once.
///
/// Dropping a responder for a call (not a notification) without answering
/// replies with an internal fault.
pub struct Responder<Q, P> {
    id: Option<u64>,
    method: &'static str,
    tx: UnboundedSender<Frame<Q, P>>,
    answered: bool,
}

impl<Q, P> Responder<Q, P> {
    pub(crate) fn new(id: Option<u64>, method: &'static str, tx: UnboundedSender<Frame<Q, P>>) -> Self {
        Self {
            id,
            method,
            tx,
            answered: false,
        }
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn resolve(self, value: P) {
        self.finish(Ok(value));
    }

    pub fn reject(self, fault: RpcFault) {
        self.finish(Err(fault));
    }

    pub fn method_not_found(self) {
        let fault = RpcFault::method_not_found(self.method);
        self.finish(Err(fault));
    }

    fn finish(mut self, outcome: std::result::Result<P, RpcFault>) {
        self.answered = true;
        self.send(outcome);
    }

    fn send(&self, outcome: std::result::Result<P, RpcFault>) {
        if let Some(id) = self.id {
            if self.tx.send(Frame::Response { id, outcome }).is_err() {
                tracing::debug!(id, method = self.method, "caller gone before reply");
            }
        }
    }
}

impl<Q, P> Drop for Responder<Q, P> {
    fn drop(&mut self) {
        if !self.answered && self.id.is_some() {
            tracing::warn!(method = self.method, "call dropped without a result");
            self.send(Err(RpcFault::no_result(self.method)));
        }
    }
}

impl<Q, P> fmt::Debug for Responder<Q, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("id", &self.id)
            .field("method", &self.method)
            .finish()
    }
}

/// Something that answers calls.
pub trait Handler<Q, P> {
    fn handle(&mut self, call: Q, reply: Responder<Q, P>);
}

impl<Q, P, F> Handler<Q, P> for F
where
    F: FnMut(Q, Responder<Q, P>),
{
    fn handle(&mut self, call: Q, reply: Responder<Q, P>) {
        self(call, reply)
    }
}

/// Incoming calls on a port.
pub struct Incoming<Q, P> {
    rx: UnboundedReceiver<Frame<Q, P>>,
    tx: UnboundedSender<Frame<Q, P>>,
}

impl<Q: RpcMethod, P> Incoming<Q, P> {
    /// Serve a port directly. Responses arriving on it are ignored.
    pub fn from_port(port: Port<Q, P>) -> Self {
        let (tx, rx) = port.into_parts();
        Self::from_parts(tx, rx)
    }

    pub(crate) fn from_parts(tx: UnboundedSender<Frame<Q, P>>, rx: UnboundedReceiver<Frame<Q, P>>) -> Self {
        Self { rx, tx }
    }

    /// Next call, or `None` once the peer is gone.
    pub async fn next(&mut self) -> Option<(Q, Responder<Q, P>)> {
        loop {
            let frame = self.rx.recv().await?;
            if let Some(call) = self.accept(frame) {
                return Some(call);
            }
        }
    }

    /// Next call if one is queued.
    pub fn try_next(&mut self) -> Result<Option<(Q, Responder<Q, P>)>> {
        loop {
            match self.rx.try_recv() {
                Ok(frame) => {
                    if let Some(call) = self.accept(frame) {
                        return Ok(Some(call));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(RpcError::Disconnected),
            }
        }
    }

    /// Handle calls until the peer disconnects.
    pub async fn serve<H: Handler<Q, P>>(&mut self, handler: &mut H) {
        while let Some((call, reply)) = self.next().await {
            handler.handle(call, reply);
        }
    }

    /// Handle every queued call without blocking. Returns how many were handled.
    pub fn poll<H: Handler<Q, P>>(&mut self, handler: &mut H) -> Result<usize> {
        let mut handled = 0;
        while let Some((call, reply)) = self.try_next()? {
            handler.handle(call, reply);
            handled += 1;
        }
        Ok(handled)
    }

    fn accept(&self, frame: Frame<Q, P>) -> Option<(Q, Responder<Q, P>)> {
        match frame {
            Frame::Request { id, call } => {
                let reply = Responder::new(id, call.method(), self.tx.clone());
                Some((call, reply))
            }
            Frame::Response { id, .. } => {
                tracing::warn!(id, "unexpected response on serving port");
                None
            }
        }
    }
}

impl<Q, P> fmt::Debug for Incoming<Q, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incoming").finish_non_exhaustive()
    }
}
