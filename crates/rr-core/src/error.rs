//! Core error types for remote-repl

use rr_protocol::{ErrorCode, HandleField, ProtocolError};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the remote-repl ecosystem
#[derive(Error, Debug)]
pub enum RrError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Remote call error
    #[error("Remote call failed: {0}")]
    Rpc(#[from] RpcError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RrError {
    /// Whether this error means the peer could not be reached or went away
    pub fn is_connection(&self) -> bool {
        match self {
            RrError::Connection(_) => true,
            RrError::Rpc(e) => e.is_connection(),
            RrError::Session(SessionError::Rpc(e)) => e.is_connection(),
            _ => false,
        }
    }
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Nothing is listening at the address
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// The connection dropped mid-call
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The address could not be bound or resolved
    #[error("Address unavailable: {0}")]
    AddressUnavailable(String),
}

/// Errors from a request/response exchange
#[derive(Error, Debug)]
pub enum RpcError {
    /// Transport failure
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Peer sent bytes we could not decode
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Peer answered with an error reply
    #[error("Remote error ({code:?}): {message}")]
    Remote { code: ErrorCode, message: String },

    /// Peer answered with a reply of the wrong kind
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl RpcError {
    /// Whether this error is a transport failure worth retrying
    pub fn is_connection(&self) -> bool {
        matches!(self, RpcError::Connection(_))
    }
}

impl From<RpcError> for std::io::Error {
    fn from(err: RpcError) -> Self {
        let kind = match &err {
            RpcError::Connection(_) => std::io::ErrorKind::ConnectionAborted,
            RpcError::Remote {
                code: ErrorCode::Unsupported,
                ..
            } => std::io::ErrorKind::Unsupported,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

/// Session-related errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Handle field written twice
    #[error("Handle field '{0}' is already assigned")]
    AlreadyAssigned(HandleField),

    /// No console thread registered on the handle
    #[error("No console is attached to this session")]
    NotAttached,

    /// Another session already holds the global context
    #[error("Another remote session is already active in this process")]
    ContextBusy,

    /// Remote call made on behalf of the session failed
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
