//! The error every call outcome and listener hook is expressed in.

use rpcwire_core::{ApplicationException, ProtocolError, TransportError};
use thiserror::Error;

/// Why a call did not produce its result.
///
/// `Transport` and `Protocol` are infrastructure failures: the connection is
/// unusable afterwards.  `Application` and `Service` are business outcomes
/// reported by the peer; the connection stays healthy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connect, read timeout, peer close, or local close.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// The reply bytes could not be decoded or did not match the call.
    #[error("protocol violation: {0}")]
    Protocol(#[source] ProtocolError),

    /// The peer answered with an application exception.
    #[error(transparent)]
    Application(ApplicationException),

    /// The method threw one of its declared exceptions.
    #[error("service exception: {0}")]
    Service(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The dispatcher was closed before the call was sent.
    #[error("client is closed")]
    DispatcherClosed,

    /// The call was dropped before an outcome arrived.
    #[error("call was cancelled before completion")]
    Cancelled,

    /// The call's own argument or result code panicked.  The stream position
    /// is unknown afterwards, so the connection is closed.
    #[error("method {method:?} panicked while encoding or decoding: {message}")]
    CodecPanic { method: String, message: String },

    /// The call was dispatched outside a tokio runtime.
    #[error("no tokio runtime is available to run the call")]
    NoRuntime,
}

impl ClientError {
    /// Returns `true` for outcomes reported by the peer, as opposed to
    /// failures of the connection or the client itself.
    pub fn is_application(&self) -> bool {
        matches!(self, ClientError::Application(_) | ClientError::Service(_))
    }

    /// Returns `true` if the underlying transport reported a closed stream.
    pub fn is_closed(&self) -> bool {
        matches!(self, ClientError::Transport(TransportError::Closed))
    }

    /// Returns `true` if no reply arrived within the read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport(TransportError::ReadTimeout(_)))
    }

    /// Downcasts a [`ClientError::Service`] to a declared exception type.
    pub fn service_exception<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            ClientError::Service(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ClientError {
    /// Transport failures surfaced through the protocol keep their identity.
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Transport(inner) => ClientError::Transport(inner),
            other => ClientError::Protocol(other),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Transport(err)
    }
}

impl From<ApplicationException> for ClientError {
    fn from(err: ApplicationException) -> Self {
        ClientError::Application(err)
    }
}
