//! Calling side of a port.

use crate::endpoint::Port;
use crate::error::{Result, RpcError, RpcFault};
use crate::frame::{Frame, RpcMethod};
use crate::id::{IdAllocator, IdAllocatorConfig};
use crate::server::Incoming;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

type Waiter<P> = oneshot::Sender<std::result::Result<P, RpcFault>>;

struct Pending<P> {
    ids: IdAllocator,
    waiters: HashMap<u64, Waiter<P>>,
    closed: bool,
}

struct Shared<Q, P> {
    tx: UnboundedSender<Frame<Q, P>>,
    pending: Mutex<Pending<P>>,
}

/// Issues calls over a port and matches responses to them by id.
///
/// Responses may arrive in any order. When the peer disconnects, every call
/// still waiting fails with [`RpcError::Disconnected`].
pub struct RpcChannel<Q, P> {
    shared: Arc<Shared<Q, P>>,
}

impl<Q, P> Clone for RpcChannel<Q, P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<Q, P> RpcChannel<Q, P>
where
    Q: RpcMethod + Send + 'static,
    P: Send + 'static,
{
    /// Start routing a port. Must be called within a tokio runtime.
    ///
    /// Calls the peer makes towards us arrive on the returned [`Incoming`].
    pub fn connect(port: Port<Q, P>) -> (Self, Incoming<Q, P>) {
        Self::connect_with(port, IdAllocatorConfig::default())
    }

    pub fn connect_with(port: Port<Q, P>, config: IdAllocatorConfig) -> (Self, Incoming<Q, P>) {
        let (tx, rx) = port.into_parts();
        let shared = Arc::new(Shared {
            tx: tx.clone(),
            pending: Mutex::new(Pending {
                ids: IdAllocator::new(config),
                waiters: HashMap::new(),
                closed: false,
            }),
        });

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(Arc::downgrade(&shared), rx, incoming_tx));

        (Self { shared }, Incoming::from_parts(tx, incoming_rx))
    }

    /// Send a call and wait for its result.
    pub async fn call(&self, call: Q) -> Result<P> {
        let (id, waiter) = {
            let mut pending = self.shared.pending.lock();
            if pending.closed {
                return Err(RpcError::Disconnected);
            }
            let id = pending.ids.allocate()?;
            let (tx, rx) = oneshot::channel();
            pending.waiters.insert(id, tx);
            (id, rx)
        };

        let method = call.method();
        tracing::trace!(id, method, "rpc call");
        if self
            .shared
            .tx
            .send(Frame::Request {
                id: Some(id),
                call,
            })
            .is_err()
        {
            let mut pending = self.shared.pending.lock();
            pending.waiters.remove(&id);
            pending.ids.release(id);
            return Err(RpcError::Disconnected);
        }

        match waiter.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(fault)) => {
                tracing::debug!(id, method, %fault, "rpc call failed");
                Err(RpcError::Fault(fault))
            }
            Err(_) => Err(RpcError::Disconnected),
        }
    }

    /// Send a call that expects no response.
    pub fn notify(&self, call: Q) -> Result<()> {
        self.shared
            .tx
            .send(Frame::Request { id: None, call })
            .map_err(|_| RpcError::Disconnected)
    }

    /// Number of calls awaiting a response.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().waiters.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.pending.lock().closed
    }
}

impl<Q, P> fmt::Debug for RpcChannel<Q, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self.shared.pending.lock();
        f.debug_struct("RpcChannel")
            .field("pending", &pending.waiters.len())
            .field("closed", &pending.closed)
            .finish()
    }
}

/// Routes frames arriving from the peer. Holds the channel weakly so that
/// dropping every handle closes the port.
async fn pump<Q, P>(
    shared: Weak<Shared<Q, P>>,
    mut rx: UnboundedReceiver<Frame<Q, P>>,
    incoming: UnboundedSender<Frame<Q, P>>,
) where
    Q: RpcMethod,
{
    while let Some(frame) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        match frame {
            Frame::Response { id, outcome } => {
                let waiter = {
                    let mut pending = shared.pending.lock();
                    pending.ids.release(id);
                    pending.waiters.remove(&id)
                };
                match waiter {
                    Some(waiter) => {
                        // The caller may have given up waiting.
                        let _ = waiter.send(outcome);
                    }
                    None => tracing::warn!(id, "response for unknown call"),
                }
            }
            Frame::Request { id, call } => {
                let method = call.method();
                if incoming.send(Frame::Request { id, call }).is_err() {
                    if let Some(id) = id {
                        let reply = Frame::Response {
                            id,
                            outcome: Err(RpcFault::method_not_found(method)),
                        };
                        if shared.tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    if let Some(shared) = shared.upgrade() {
        let mut pending = shared.pending.lock();
        pending.closed = true;
        let orphaned = pending.waiters.len();
        pending.waiters.clear();
        pending.ids.clear();
        if orphaned > 0 {
            tracing::debug!(orphaned, "rpc peer disconnected with calls pending");
        }
    }
}
