//! Message types for the remote-repl protocol
//!
//! Every exchange is a request answered by exactly one reply carrying the
//! same call id.
//!
//! # Message Flow
//!
//! Typical sequence for one session:
//!
//! 1. Console sends `Ping` to the endpoint to flush any stale connection
//! 2. Console sends `Assign` for input, output, (stdout, stderr) and thread,
//!    each answered with `Ack`
//! 3. Endpoint calls back into the console: `Readline` → `Line`,
//!    `Output` → `Ack`, `SetCompletion`/`GetCompletion` → `Ack`/`Completion`
//! 4. Session end: endpoint sends `Wake` to the console's thread object

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::object::{HandleField, ObjectId, RemoteRef};

/// Message type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Liveness probe
    Ping = 0x01,
    /// Probe reply
    Pong = 0x02,
    /// Assign an object to a session handle field
    Assign = 0x03,
    /// Read one line from an input object
    Readline = 0x04,
    /// Line read reply
    Line = 0x05,
    /// Output operation on a writer object
    Output = 0x06,
    /// Install completion candidates
    SetCompletion = 0x07,
    /// Query completion candidates
    GetCompletion = 0x08,
    /// Completion query reply
    Completion = 0x09,
    /// Resume a parked thread of control
    Wake = 0x0A,
    /// Generic success reply
    Ack = 0x0B,
    /// Error reply
    Error = 0xFF,
}

impl MessageType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Ping),
            0x02 => Some(Self::Pong),
            0x03 => Some(Self::Assign),
            0x04 => Some(Self::Readline),
            0x05 => Some(Self::Line),
            0x06 => Some(Self::Output),
            0x07 => Some(Self::SetCompletion),
            0x08 => Some(Self::GetCompletion),
            0x09 => Some(Self::Completion),
            0x0A => Some(Self::Wake),
            0x0B => Some(Self::Ack),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }
}

/// Error codes for error replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// Unknown error
    Unknown = 0,
    /// Request not valid for this service
    InvalidMessage = 1,
    /// No object with that id
    ObjectNotFound = 2,
    /// Handle field was already assigned
    AlreadyAssigned = 3,
    /// Object does not support the operation
    Unsupported = 4,
    /// Local device failed
    Io = 5,
}

/// Output operations forwarded verbatim to a writer object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputOp {
    /// Raw bytes
    Write(Bytes),
    /// Text written as-is
    Print(Vec<String>),
    /// Pre-formatted text
    Printf(String),
    /// Lines, each terminated with a newline unless it already has one
    Puts(Vec<String>),
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Liveness probe, also used to clear a half-closed prior connection
    Ping { nonce: u64 },

    /// Probe reply echoing the nonce
    Pong { nonce: u64 },

    /// Assign a console object to a handle field
    Assign {
        field: HandleField,
        object: RemoteRef,
    },

    /// Read one line
    Readline {
        object: ObjectId,
        /// Prompt, absent for prompt-blind callers
        prompt: Option<String>,
    },

    /// A line, or `None` at end of input
    Line(Option<String>),

    /// Write to an output object
    Output { object: ObjectId, op: OutputOp },

    /// Install completion candidates on an input object
    SetCompletion {
        object: ObjectId,
        candidates: Vec<String>,
    },

    /// Query installed completion candidates
    GetCompletion { object: ObjectId },

    /// Installed candidates, `None` if the object has no completion
    Completion(Option<Vec<String>>),

    /// Resume the parked thread object
    Wake { object: ObjectId },

    /// Success
    Ack,

    /// Error response
    Error {
        /// Error code
        code: ErrorCode,
        /// Human-readable message
        message: String,
    },
}

impl Message {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Ping { .. } => MessageType::Ping,
            Message::Pong { .. } => MessageType::Pong,
            Message::Assign { .. } => MessageType::Assign,
            Message::Readline { .. } => MessageType::Readline,
            Message::Line(_) => MessageType::Line,
            Message::Output { .. } => MessageType::Output,
            Message::SetCompletion { .. } => MessageType::SetCompletion,
            Message::GetCompletion { .. } => MessageType::GetCompletion,
            Message::Completion(_) => MessageType::Completion,
            Message::Wake { .. } => MessageType::Wake,
            Message::Ack => MessageType::Ack,
            Message::Error { .. } => MessageType::Error,
        }
    }

    /// Build an error reply
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Message::Error {
            code,
            message: message.into(),
        }
    }
}
