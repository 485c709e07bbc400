//! # rpcwire-core
//!
//! Wire-level building blocks for a binary RPC client: byte-stream
//! transports, the binary protocol codec, and the contract every
//! serialisable struct satisfies.
//!
//! This crate knows nothing about calls, replies, or correlation; that lives
//! in `rpcwire-client`.  It has no async runtime dependency.
//!
//! # Architecture overview (for beginners)
//!
//! An RPC request is a *message*: an envelope naming the remote method,
//! followed by one struct holding the arguments.  Getting it onto the wire
//! takes three layers:
//!
//! - **`transport`** – moves raw bytes.  A TCP socket in production, an
//!   in-memory buffer in tests, optionally wrapped in length-prefixed frames.
//!
//! - **`protocol`** – turns structured values into bytes and back.  The
//!   binary protocol is self-describing: every field carries a type tag, so
//!   unknown fields can be skipped without a schema.
//!
//! - **`schema`** – the traits generated types implement (`Encode`,
//!   `Decode`, `WireValue`), the `ApplicationException` struct, and a
//!   schema-less `Value` for inspecting arbitrary traffic.

pub mod protocol;
pub mod schema;
pub mod transport;

// Re-export the most-used types at the crate root so callers can write
// `rpcwire_core::BinaryProtocol` instead of `rpcwire_core::protocol::binary::BinaryProtocol`.
pub use protocol::{
    BinaryProtocol, BinaryProtocolConfig, MessageHeader, MessageKind, Protocol, ProtocolError,
    SequenceCounter, TType,
};
pub use schema::{
    read_struct, write_field, write_optional_field, write_struct, ApplicationException,
    ApplicationExceptionKind, Decode, Encode, StructValue, Value, WireValue,
};
pub use transport::{
    BufferTransport, CloseHandle, FramedTransport, SocketTransport, Transport, TransportError,
};
