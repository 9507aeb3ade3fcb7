//! rr-protocol: Wire protocol for remote-repl sessions
//!
//! This crate defines the binary protocol spoken between a session endpoint
//! (hosted inside the target process) and a console attaching to it. Both
//! sides run a small request/response service; only object references ever
//! cross the connection, never the devices they name.

pub mod address;
pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod object;

pub use address::{Address, DEFAULT_HOST, DEFAULT_PORT, SCHEME};
pub use codec::{Frame, FrameCodec};
pub use error::ProtocolError;
pub use frame::{CallId, FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{ErrorCode, Message, MessageType, OutputOp};
pub use object::{HandleField, ObjectId, ReadlineCapability, RemoteRef};
