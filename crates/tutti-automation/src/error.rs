//! Error types for automation scheduling.

use crate::graph::{NodeId, ParamId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    #[error("event at {time}s overlaps a scheduled value curve")]
    Overlap { time: f64 },

    #[error("cannot hold a ramp at {time}s that follows a set-target event")]
    TargetHold { time: f64 },

    #[error("invalid time: {0}")]
    InvalidTime(f64),

    #[error("invalid value: {0}")]
    InvalidValue(f64),

    #[error("invalid duration: {0}")]
    InvalidDuration(f64),

    #[error("invalid time constant: {0}")]
    InvalidTimeConstant(f64),

    #[error("value curve needs at least two values, got {0}")]
    CurveTooShort(usize),

    #[error("unknown node: {0:?}")]
    UnknownNode(NodeId),

    #[error("unknown parameter: {0:?}")]
    UnknownParam(ParamId),
}

pub type Result<T> = std::result::Result<T, AutomationError>;
