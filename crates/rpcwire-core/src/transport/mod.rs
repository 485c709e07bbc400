//! Byte-stream transports.
//!
//! A [`Transport`] moves raw bytes and nothing else: it has no idea where one
//! message ends and the next begins.  Framing (if any) is layered on top by
//! [`FramedTransport`], and structure is layered on top of that by a
//! [`crate::protocol::Protocol`].
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connected ──close()──▶ Closed
//!       │                                              ▲
//!       └──────────────────close()─────────────────────┘
//! ```
//!
//! `Closed` is terminal.  Every operation on a closed transport fails with
//! [`TransportError::Closed`], which is also how a peer-initiated disconnect
//! surfaces during a read.

pub mod buffer;
pub mod framed;
pub mod socket;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

pub use buffer::BufferTransport;
pub use framed::FramedTransport;
pub use socket::{SocketConfig, SocketTransport, SocketTransportBuilder};

/// Errors raised by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was configured with a missing or out-of-range value.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// The peer could not be reached within the connect timeout.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No data arrived before the read deadline.
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The transport was closed locally or by the peer.
    #[error("transport closed")]
    Closed,

    /// An operation was attempted before `connect()`.
    #[error("transport is not connected")]
    NotConnected,

    /// A socket was created outside a tokio runtime.
    #[error("no tokio runtime is available to drive the socket")]
    NoRuntime,

    /// A frame header declared a negative or oversized length.
    #[error("invalid frame size: {0}")]
    FrameSize(i32),

    /// Any other I/O failure on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A blocking, bidirectional byte stream.
///
/// Implementations must be `Send` so a dispatcher can drive them from a
/// blocking worker thread.
pub trait Transport: Send {
    /// Fills `buf` completely, blocking until enough bytes arrive.
    ///
    /// # Errors
    ///
    /// [`TransportError::ReadTimeout`] if the read deadline elapses first,
    /// [`TransportError::Closed`] if the peer closes the stream or the
    /// transport was closed locally.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Queues `buf` for sending.  Bytes may sit in a buffer until [`flush`].
    ///
    /// [`flush`]: Transport::flush
    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Pushes every previously written byte to the peer.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Closes the transport.  Idempotent.
    fn close(&mut self);

    /// Returns `true` once the transport has been closed from any side.
    fn is_closed(&self) -> bool;

    /// Returns a handle that can close this transport from another thread,
    /// unblocking any read in progress.
    fn close_handle(&self) -> CloseHandle;
}

/// Closes a transport from outside the thread that currently owns it.
///
/// The handle is a `watch` channel carrying the closed flag.  Transports
/// check it before every operation, and socket reads race it against the
/// incoming bytes, so a read blocked on a silent peer returns as soon as
/// [`CloseHandle::close`] is called.  Clones share the same flag.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    /// Creates a handle in the open state.
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Marks the transport closed and wakes every task waiting in
    /// [`closed`](Self::closed).  Idempotent.
    pub fn close(&self) {
        self.signal.send_replace(true);
    }

    /// Returns `true` once [`close`](Self::close) has been called on any clone.
    pub fn is_closed(&self) -> bool {
        *self.signal.borrow()
    }

    /// Completes once the handle is closed.
    pub async fn closed(&self) {
        let mut rx = self.signal.subscribe();
        // The sender is owned by `self`, so the channel cannot be dropped
        // while this future is alive.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}
