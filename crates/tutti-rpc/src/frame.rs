//! Message frames exchanged over a port.

use crate::error::RpcFault;
use serde::{Deserialize, Serialize};

/// Closed set of calls understood by a peer.
///
/// Request enums are usually serialized adjacently tagged
/// (`#[serde(tag = "method", content = "params")]`) so that a
/// [`WireRequest`] renders as `{id, method, params}`.
pub trait RpcMethod {
    fn method(&self) -> &'static str;
}

/// One message on a port.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<Q, P> {
    /// A call. Notifications carry no id and are never answered.
    Request { id: Option<u64>, call: Q },
    Response {
        id: u64,
        outcome: Result<P, RpcFault>,
    },
}

impl<Q, P> Frame<Q, P> {
    pub fn id(&self) -> Option<u64> {
        match self {
            Frame::Request { id, .. } => *id,
            Frame::Response { id, .. } => Some(*id),
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Frame::Request { .. })
    }
}

/// `{id, method, params}`, with a null `id` for notifications. A missing
/// `id` reads as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest<Q> {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub call: Q,
}

/// `{id, result}` or `{id, error: {code, message}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse<P> {
    pub id: u64,
    #[serde(flatten)]
    pub outcome: Outcome<P>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome<P> {
    Result(P),
    Error(RpcFault),
}

impl<P> From<Result<P, RpcFault>> for Outcome<P> {
    fn from(result: Result<P, RpcFault>) -> Self {
        match result {
            Ok(value) => Outcome::Result(value),
            Err(fault) => Outcome::Error(fault),
        }
    }
}

impl<P> From<Outcome<P>> for Result<P, RpcFault> {
    fn from(outcome: Outcome<P>) -> Self {
        match outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(fault) => Err(fault),
        }
    }
}

impl<Q, P> From<WireRequest<Q>> for Frame<Q, P> {
    fn from(wire: WireRequest<Q>) -> Self {
        Frame::Request {
            id: wire.id,
            call: wire.call,
        }
    }
}

impl<Q, P> From<WireResponse<P>> for Frame<Q, P> {
    fn from(wire: WireResponse<P>) -> Self {
        Frame::Response {
            id: wire.id,
            outcome: wire.outcome.into(),
        }
    }
}

/// Either wire shape of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame<Q, P> {
    Request(WireRequest<Q>),
    Response(WireResponse<P>),
}

impl<Q, P> From<Frame<Q, P>> for WireFrame<Q, P> {
    fn from(frame: Frame<Q, P>) -> Self {
        match frame {
            Frame::Request { id, call } => WireFrame::Request(WireRequest { id, call }),
            Frame::Response { id, outcome } => WireFrame::Response(WireResponse {
                id,
                outcome: outcome.into(),
            }),
        }
    }
}
