//! Frame header
//!
//! Every request and every reply starts with eight bytes:
//!
//! ```text
//! +----------------+------+---------------+
//! | call id (u32)  | type | payload (u24) |
//! +----------------+------+---------------+
//! ```
//!
//! All fields are big-endian. A reply repeats the call id of the request it
//! answers, which is how a client that shares a connection pool between
//! tasks pairs the two up.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::message::MessageType;

pub const HEADER_SIZE: usize = 8;

/// Largest payload the 24-bit length field can describe
pub const MAX_PAYLOAD_SIZE: usize = 0x00FF_FFFF;

/// Pairs a reply with its request
pub type CallId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub call_id: CallId,
    pub message_type: MessageType,
    pub payload_length: u32,
}

impl FrameHeader {
    pub fn new(call_id: CallId, message_type: MessageType, payload_length: u32) -> Self {
        Self {
            call_id,
            message_type,
            payload_length,
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let length = self.payload_length.to_be_bytes();
        dst.reserve(HEADER_SIZE);
        dst.put_u32(self.call_id);
        dst.put_u8(self.message_type.as_u8());
        dst.put_slice(&length[1..]);
    }

    /// Take a header off the front of `src`.
    ///
    /// Leaves `src` untouched and returns `Ok(None)` until all eight bytes
    /// are there. An unknown type byte is an error and consumes nothing.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let type_byte = src[4];
        let message_type =
            MessageType::from_u8(type_byte).ok_or(ProtocolError::UnknownMessageType(type_byte))?;

        let call_id = src.get_u32();
        src.advance(1);
        let mut length = [0u8; 4];
        src.copy_to_slice(&mut length[1..]);

        Ok(Some(Self::new(call_id, message_type, u32::from_be_bytes(length))))
    }
}
