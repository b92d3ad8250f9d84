//! Error types for RPC channels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard fault codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    InternalError = -32603,
    InvalidParams = -32602,
    MethodNotFound = -32601,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32603 => Some(ErrorCode::InternalError),
            -32602 => Some(ErrorCode::InvalidParams),
            -32601 => Some(ErrorCode::MethodNotFound),
            _ => None,
        }
    }
}

/// A failed call as seen on the wire: `{code, message}`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct RpcFault {
    pub code: i32,
    pub message: String,
}

impl RpcFault {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("The requested method called \"{method}\" is not supported."),
        )
    }

    pub fn no_result(method: &str) -> Self {
        Self::new(
            ErrorCode::InternalError,
            format!("The handler of the method called \"{method}\" returned no required result."),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The peer answered with a fault. Other calls on the channel are unaffected.
    #[error("RPC fault: {0}")]
    Fault(#[from] RpcFault),

    #[error("RPC peer disconnected")]
    Disconnected,

    #[error("Correlation id space exhausted")]
    IdsExhausted,
}

impl RpcError {
    pub fn fault_code(&self) -> Option<ErrorCode> {
        match self {
            RpcError::Fault(fault) => fault.error_code(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
