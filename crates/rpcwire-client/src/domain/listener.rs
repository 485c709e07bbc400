//! Connection lifecycle notifications.

use super::ClientError;

/// Out-of-band observer of a client's connection.
///
/// Each hook fires at most once per transport lifetime, and at most one of
/// the two fires: a connection either closes cleanly (locally or by the
/// peer) or dies of an error.  Hooks are informational; per-call outcomes
/// still reach each call's own callback.
///
/// Hooks run on the thread that observed the event, which may be a blocking
/// I/O thread.  Keep them short.
#[cfg_attr(test, mockall::automock)]
pub trait ClientListener: Send + Sync {
    /// The transport was closed, by `close()` or by the peer.
    fn on_transport_closed(&self);

    /// The connection failed with an unrecoverable error.
    fn on_error(&self, error: &ClientError);
}

/// A listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ClientListener for NoopListener {
    fn on_transport_closed(&self) {}

    fn on_error(&self, _error: &ClientError) {}
}
