//! A [`ClientListener`] that writes lifecycle events to the log.

use tracing::{error, info};

use crate::domain::{ClientError, ClientListener};

/// Logs `on_transport_closed` at info level and `on_error` at error level.
///
/// `peer` is included in every line so logs from several clients can be
/// told apart.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    peer: String,
}

impl LoggingListener {
    pub fn new(peer: impl Into<String>) -> Self {
        Self { peer: peer.into() }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl ClientListener for LoggingListener {
    fn on_transport_closed(&self) {
        info!(peer = %self.peer, "connection closed");
    }

    fn on_error(&self, error: &ClientError) {
        error!(peer = %self.peer, "connection failed: {error}");
    }
}
