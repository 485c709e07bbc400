//! In-memory transport backed by a growable byte buffer.
//!
//! Writes append to the end of the buffer and reads consume from the front,
//! so a single `BufferTransport` can be used to encode a value and then
//! decode it again.  Reading past the end behaves like a peer that closed the
//! connection.

use super::{CloseHandle, Transport, TransportError};

/// A [`Transport`] over a `Vec<u8>`.
#[derive(Debug, Default)]
pub struct BufferTransport {
    data: Vec<u8>,
    read_pos: usize,
    closed: CloseHandle,
}

impl BufferTransport {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer pre-loaded with `bytes` to be read.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: bytes.into(),
            ..Self::default()
        }
    }

    /// All bytes written so far, including ones already read.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes not yet consumed by [`Transport::read`].
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Consumes the transport and returns the underlying buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Transport for BufferTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let end = self.read_pos + buf.len();
        if end > self.data.len() {
            return Err(TransportError::Closed);
        }
        buf.copy_from_slice(&self.data[self.read_pos..end]);
        self.read_pos = end;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed.close();
    }

    fn is_closed(&self) -> bool {
        self.closed.is_closed()
    }

    fn close_handle(&self) -> CloseHandle {
        self.closed.clone()
    }
}
