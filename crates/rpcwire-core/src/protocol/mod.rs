//! Protocol layer: the object-safe [`Protocol`] trait, its binary
//! implementation, generic skipping of unknown values, and sequence ids.
//!
//! A protocol is a stateless translator between structured values and bytes
//! on a [`Transport`](crate::transport::Transport).  "Begin"/"end" calls
//! bracket messages, structs, fields, and containers; implementations decide
//! which of them produce bytes (in the binary encoding, struct and field
//! *ends* produce nothing at all).

pub mod binary;
pub mod sequence;
pub mod skip;
pub mod wire;

use thiserror::Error;

use crate::transport::{CloseHandle, TransportError};

pub use binary::{BinaryProtocol, BinaryProtocolConfig};
pub use sequence::SequenceCounter;
pub use skip::skip;
pub use wire::{
    FieldHeader, ListHeader, MapHeader, MessageHeader, MessageKind, SetHeader, TType,
};

/// Errors raised while encoding or decoding.
///
/// Every variant except [`ProtocolError::Transport`] means the byte stream no
/// longer lines up with the decoder's expectations; the connection cannot be
/// reused after any of them.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The transport failed underneath the protocol.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A field or element type tag is not part of the wire format.
    #[error("unknown wire type tag: {0}")]
    UnknownType(u8),

    /// A message header carried an undefined message kind.
    #[error("unknown message kind: {0}")]
    UnknownMessageKind(u8),

    /// A strict message header carried an unsupported version.
    #[error("bad protocol version: 0x{0:08X}")]
    BadVersion(u32),

    /// A legacy (unversioned) header arrived while strict reads are required.
    #[error("message header has no version and strict reads are enabled")]
    MissingVersion,

    /// A length or element count was negative.
    #[error("negative {what} length: {len}")]
    NegativeSize { what: &'static str, len: i32 },

    /// A length or element count exceeded the configured limit.
    #[error("{what} length {len} exceeds limit {limit}")]
    SizeLimit {
        what: &'static str,
        len: usize,
        limit: usize,
    },

    /// String bytes were not valid UTF-8.
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Structs and containers were nested deeper than allowed.
    #[error("maximum nesting depth {0} exceeded")]
    DepthLimit(usize),

    /// Well-formed bytes that make no sense for the value being decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A reply's sequence id did not match the call awaiting it.
    #[error("sequence id mismatch: expected {expected}, received {received}")]
    BadSequenceId { expected: i32, received: i32 },

    /// A reply named a different method than the call awaiting it.
    #[error("reply for method {received:?} does not match call {expected:?}")]
    WrongMethodName { expected: String, received: String },

    /// A reply envelope carried `Call` or `Oneway`.
    #[error("unexpected message kind {0:?} in reply")]
    UnexpectedMessageKind(MessageKind),
}

impl ProtocolError {
    /// Returns the transport failure this error wraps, if any.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            ProtocolError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Encoder/decoder over a [`Transport`](crate::transport::Transport).
///
/// The trait is object safe so that generated code and the client dispatcher
/// can work with `&mut dyn Protocol` without knowing the encoding.
pub trait Protocol: Send {
    // ── Writing ───────────────────────────────────────────────────────────────

    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError>;
    fn write_message_end(&mut self) -> Result<(), ProtocolError>;
    fn write_struct_begin(&mut self, name: &str) -> Result<(), ProtocolError>;
    fn write_struct_end(&mut self) -> Result<(), ProtocolError>;
    fn write_field_begin(&mut self, header: &FieldHeader) -> Result<(), ProtocolError>;
    fn write_field_end(&mut self) -> Result<(), ProtocolError>;
    fn write_field_stop(&mut self) -> Result<(), ProtocolError>;
    fn write_list_begin(&mut self, header: &ListHeader) -> Result<(), ProtocolError>;
    fn write_list_end(&mut self) -> Result<(), ProtocolError>;
    fn write_set_begin(&mut self, header: &SetHeader) -> Result<(), ProtocolError>;
    fn write_set_end(&mut self) -> Result<(), ProtocolError>;
    fn write_map_begin(&mut self, header: &MapHeader) -> Result<(), ProtocolError>;
    fn write_map_end(&mut self) -> Result<(), ProtocolError>;
    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError>;
    fn write_byte(&mut self, value: i8) -> Result<(), ProtocolError>;
    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError>;
    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError>;
    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError>;
    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError>;
    fn write_string(&mut self, value: &str) -> Result<(), ProtocolError>;
    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError>;

    // ── Reading ───────────────────────────────────────────────────────────────

    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError>;
    fn read_message_end(&mut self) -> Result<(), ProtocolError>;
    fn read_struct_begin(&mut self) -> Result<(), ProtocolError>;
    fn read_struct_end(&mut self) -> Result<(), ProtocolError>;
    fn read_field_begin(&mut self) -> Result<FieldHeader, ProtocolError>;
    fn read_field_end(&mut self) -> Result<(), ProtocolError>;
    fn read_list_begin(&mut self) -> Result<ListHeader, ProtocolError>;
    fn read_list_end(&mut self) -> Result<(), ProtocolError>;
    fn read_set_begin(&mut self) -> Result<SetHeader, ProtocolError>;
    fn read_set_end(&mut self) -> Result<(), ProtocolError>;
    fn read_map_begin(&mut self) -> Result<MapHeader, ProtocolError>;
    fn read_map_end(&mut self) -> Result<(), ProtocolError>;
    fn read_bool(&mut self) -> Result<bool, ProtocolError>;
    fn read_byte(&mut self) -> Result<i8, ProtocolError>;
    fn read_i16(&mut self) -> Result<i16, ProtocolError>;
    fn read_i32(&mut self) -> Result<i32, ProtocolError>;
    fn read_i64(&mut self) -> Result<i64, ProtocolError>;
    fn read_double(&mut self) -> Result<f64, ProtocolError>;
    fn read_string(&mut self) -> Result<String, ProtocolError>;
    fn read_binary(&mut self) -> Result<Vec<u8>, ProtocolError>;

    // ── Transport control ─────────────────────────────────────────────────────

    /// Flushes the underlying transport.
    fn flush(&mut self) -> Result<(), ProtocolError>;

    /// Closes the underlying transport.
    fn close(&mut self);

    /// Returns `true` once the underlying transport is closed.
    fn is_closed(&self) -> bool;

    /// Out-of-band close handle for the underlying transport.
    fn close_handle(&self) -> CloseHandle;
}
