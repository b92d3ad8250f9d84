//! Centralized error type for the tutti-capture umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "demux")]
    #[error("Demux: {0}")]
    Demux(#[from] tutti_demux::FormatError),

    #[cfg(feature = "demux")]
    #[error("Demux: {0}")]
    Bounds(#[from] tutti_demux::BoundsError),

    #[cfg(feature = "automation")]
    #[error("Automation: {0}")]
    Automation(#[from] tutti_automation::AutomationError),

    #[cfg(feature = "rpc")]
    #[error("RPC: {0}")]
    Rpc(#[from] tutti_rpc::RpcError),

    #[cfg(feature = "recorder")]
    #[error(transparent)]
    Recorder(#[from] tutti_recorder::RecorderError),

    #[cfg(feature = "recorder")]
    #[error(transparent)]
    State(#[from] tutti_recorder::StateError),
}

pub type Result<T> = std::result::Result<T, Error>;
