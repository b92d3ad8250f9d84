//! # Tutti RPC
//!
//! Correlated request/response messaging between execution realms that only
//! share message ports.
//!
//! A [`Port`] carries [`Frame`]s both ways. The calling side wraps it in an
//! [`RpcChannel`], which tags each call with a unique id from an
//! [`IdAllocator`] and resolves the matching future when the response comes
//! back, in whatever order responses arrive. The serving side reads calls
//! from an [`Incoming`] and answers each through a [`Responder`].
//!
//! ```ignore
//! let (client, server) = port_pair::<Call, Reply>();
//! let (channel, _incoming) = RpcChannel::connect(client);
//! let mut incoming = Incoming::from_port(server);
//!
//! // render thread, once per quantum
//! incoming.poll(&mut handler)?;
//!
//! // control side
//! let reply = channel.call(Call::Characterize).await?;
//! ```

pub mod channel;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod id;
pub mod server;

pub use channel::RpcChannel;
pub use endpoint::{endpoint_pair, port_pair, Endpoint, Port};
pub use error::{ErrorCode, Result, RpcError, RpcFault};
pub use frame::{Frame, Outcome, RpcMethod, WireFrame, WireRequest, WireResponse};
pub use id::{IdAllocator, IdAllocatorConfig, MAX_SAFE_ID};
pub use server::{Handler, Incoming, Responder};
