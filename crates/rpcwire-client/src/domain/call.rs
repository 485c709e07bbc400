//! What the dispatcher knows about a method call.
//!
//! Generated service code produces one type per method that implements
//! [`MethodCall`] (and [`ReplyingCall`] unless the method is oneway).  The
//! dispatcher writes the envelope; the call writes its own arguments struct
//! and reads its own result struct.

use rpcwire_core::{Protocol, ProtocolError};

use super::ClientError;

/// A request ready to be serialised.
pub trait MethodCall: Send + 'static {
    /// Remote method name, written into the envelope.
    fn name(&self) -> &str;

    /// Writes the complete arguments struct (begin, fields, stop, end).
    fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError>;
}

/// A two-way call that reads a result struct from its reply.
pub trait ReplyingCall: MethodCall {
    type Output: Send + 'static;

    /// Reads the result struct of a `Reply` message.
    ///
    /// The result struct holds at most one set field: 0 for the return value,
    /// or the id of a declared exception.  Implementations map them to:
    ///
    /// - `Ok(value)` for field 0 (or `Ok(())` for void methods with no field),
    /// - `Err(ClientError::Service(..))` for a declared exception,
    /// - `Err(ClientError::Application(..))` of kind `MissingResult` when a
    ///   non-void method's reply carries no field at all.
    ///
    /// Decode failures are returned as `ClientError::Protocol` (or
    /// `Transport`) and are fatal to the connection.
    fn read_result(&self, protocol: &mut dyn Protocol) -> Result<Self::Output, ClientError>;
}
