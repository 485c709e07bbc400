//! TCP transport with connect and read deadlines.
//!
//! # Blocking calls over a tokio socket (for beginners)
//!
//! The binary protocol has no length prefix on messages: the only way to know
//! where a reply ends is to decode it field by field, pulling bytes from the
//! socket as the decoder asks for them.  The decoder is synchronous, so
//! [`Transport::read`] is too.  Underneath sits a `tokio::net::TcpStream`;
//! every blocking call hands one future to the runtime that connected the
//! socket (`Handle::block_on`) and waits for it.
//!
//! Reads race `tokio::time::timeout` against the transport's
//! [`CloseHandle`]: a silent peer surfaces as [`TransportError::ReadTimeout`]
//! and a close from another thread wakes the reader at once.
//!
//! The blocking methods must not be called from an async task.  Run them on
//! tokio's blocking pool (`spawn_blocking`), as the dispatcher in
//! `rpcwire-client` does, or on a plain thread.  On a current-thread runtime
//! the socket only makes progress while that runtime's own thread is inside
//! `block_on`.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::debug;

use super::{CloseHandle, Transport, TransportError};

/// Default time allowed for the TCP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a read may wait for data.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated socket settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Hostname or IP address of the peer.
    pub host: String,
    /// TCP port of the peer.
    pub port: u16,
    /// Maximum time allowed for the TCP handshake.
    pub connect_timeout: Duration,
    /// Maximum time a single read may wait for data.
    pub read_timeout: Duration,
}

impl SocketConfig {
    /// Checks every field, returning [`TransportError::InvalidConfig`] for the
    /// first bad one.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.host.trim().is_empty() {
            return Err(TransportError::InvalidConfig("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(TransportError::InvalidConfig("port must be non-zero".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "connect timeout must be positive".into(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "read timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`SocketTransport`].
///
/// ```rust
/// use std::time::Duration;
/// use rpcwire_core::transport::SocketTransport;
///
/// let transport = SocketTransport::builder("localhost", 9090)
///     .read_timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(transport.config().port, 9090);
/// ```
#[derive(Debug, Clone)]
pub struct SocketTransportBuilder {
    config: SocketConfig,
}

impl SocketTransportBuilder {
    /// Sets the TCP handshake deadline.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the per-read deadline.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Validates the settings and creates a disconnected transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfig`] for an empty host, port 0,
    /// or a zero timeout.
    pub fn build(self) -> Result<SocketTransport, TransportError> {
        self.config.validate()?;
        Ok(SocketTransport {
            config: self.config,
            link: None,
            write_buf: Vec::new(),
            closed: CloseHandle::new(),
        })
    }
}

/// A live stream and the runtime whose reactor drives it.
#[derive(Debug)]
struct Link {
    stream: TcpStream,
    runtime: Handle,
}

/// A [`Transport`] over a TCP connection.
#[derive(Debug)]
pub struct SocketTransport {
    config: SocketConfig,
    link: Option<Link>,
    write_buf: Vec<u8>,
    closed: CloseHandle,
}

impl SocketTransport {
    /// Starts building a transport for `host:port` with default timeouts.
    pub fn builder(host: impl Into<String>, port: u16) -> SocketTransportBuilder {
        SocketTransportBuilder {
            config: SocketConfig {
                host: host.into(),
                port,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                read_timeout: DEFAULT_READ_TIMEOUT,
            },
        }
    }

    /// Wraps a stream accepted by a listener.  The transport starts connected.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`TransportError::NoRuntime`] outside a runtime,
    /// [`TransportError::InvalidConfig`] for a zero `read_timeout`, or an I/O
    /// error if the socket options cannot be applied.
    pub fn accepted(stream: TcpStream, read_timeout: Duration) -> Result<Self, TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let peer = stream.peer_addr()?;
        let config = SocketConfig {
            host: peer.ip().to_string(),
            port: peer.port(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout,
        };
        config.validate()?;
        let mut transport = Self {
            config,
            link: None,
            write_buf: Vec::new(),
            closed: CloseHandle::new(),
        };
        transport.install(stream, runtime)?;
        Ok(transport)
    }

    /// The validated settings this transport was built with.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Returns `true` between a successful `connect()` and `close()`.
    pub fn is_connected(&self) -> bool {
        self.link.is_some() && !self.closed.is_closed()
    }

    /// Opens the TCP connection, bounded by the connect timeout.
    ///
    /// The transport remembers the runtime this runs on; its blocking
    /// methods use that runtime to drive the socket.  Calling `connect()` on
    /// a connected transport is a no-op.
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] if the peer cannot be reached in time,
    /// [`TransportError::Closed`] if the transport was already closed.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.closed.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.link.is_some() {
            return Ok(());
        }
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let addr = self.config.addr();
        let attempt = TcpStream::connect((self.config.host.as_str(), self.config.port));
        let stream = match tokio::time::timeout(self.config.connect_timeout, attempt).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                debug!("connect attempt to {addr} failed: {source}");
                return Err(TransportError::Connect { addr, source });
            }
            Err(_) => {
                let source = std::io::Error::new(
                    ErrorKind::TimedOut,
                    format!("no answer within {:?}", self.config.connect_timeout),
                );
                return Err(TransportError::Connect { addr, source });
            }
        };

        self.install(stream, runtime)?;
        debug!("connected to {addr}");
        Ok(())
    }

    fn install(&mut self, stream: TcpStream, runtime: Handle) -> Result<(), TransportError> {
        stream.set_nodelay(true)?;
        self.link = Some(Link { stream, runtime });
        Ok(())
    }

    /// Translates a failed read or write, taking a concurrent close into account.
    fn classify(&mut self, error: std::io::Error) -> TransportError {
        if self.closed.is_closed() {
            return TransportError::Closed;
        }
        match error.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof => {
                debug!("peer {} closed the connection", self.config.addr());
                self.close();
                TransportError::Closed
            }
            _ => TransportError::Io(error),
        }
    }

    /// Drops the stream after the close handle interrupted an operation.
    fn interrupted(&mut self) -> TransportError {
        debug!("operation on {} interrupted by close", self.config.addr());
        self.close();
        TransportError::Closed
    }

    fn open_link(&mut self) -> Result<&mut Link, TransportError> {
        if self.closed.is_closed() {
            return Err(TransportError::Closed);
        }
        self.link.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl Transport for SocketTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let read_timeout = self.config.read_timeout;
        let closed = self.closed.clone();
        let Link { stream, runtime } = self.open_link()?;

        let outcome = runtime.block_on(async {
            tokio::select! {
                result = tokio::time::timeout(read_timeout, stream.read_exact(buf)) => Some(result),
                () = closed.closed() => None,
            }
        });

        match outcome {
            Some(Ok(Ok(_))) => Ok(()),
            Some(Ok(Err(e))) => Err(self.classify(e)),
            Some(Err(_elapsed)) => Err(TransportError::ReadTimeout(read_timeout)),
            None => Err(self.interrupted()),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.open_link()?;
        self.write_buf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let pending = std::mem::take(&mut self.write_buf);
        let closed = self.closed.clone();
        let Link { stream, runtime } = self.open_link()?;

        let outcome = runtime.block_on(async {
            let send = async {
                match stream.write_all(&pending).await {
                    Ok(()) => stream.flush().await,
                    Err(e) => Err(e),
                }
            };
            tokio::select! {
                result = send => Some(result),
                () = closed.closed() => None,
            }
        });

        match outcome {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(self.classify(e)),
            None => Err(self.interrupted()),
        }
    }

    fn close(&mut self) {
        if self.link.is_none() && self.closed.is_closed() {
            return;
        }
        self.closed.close();
        self.write_buf.clear();
        if self.link.take().is_some() {
            debug!("closed connection to {}", self.config.addr());
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.is_closed()
    }

    fn close_handle(&self) -> CloseHandle {
        self.closed.clone()
    }
}
