//! The client dispatcher: one connection, one call on the wire at a time.
//!
//! # How a call flows (for beginners)
//!
//! ```text
//!  caller task             blocking pool thread                    peer
//!  ───────────             ────────────────────                    ────
//!  call(c).await ──spawn──▶ lock connection
//!                           allocate seq, register pending
//!                           write envelope + args, flush ────────▶
//!                           read reply envelope  ◀──────────────── reply
//!                           check seq / name / kind
//!                           read result struct, remove pending
//!  ◀──── oneshot ────────── callback.on_success / on_error
//! ```
//!
//! Sending a request and reading its reply form one critical section under
//! the connection's `tokio::sync::Mutex`, so replies always arrive in request
//! order.  The protocol is synchronous, so that section runs on tokio's
//! blocking pool and takes the lock with `blocking_lock`.
//!
//! The dispatcher state and the listener flag live outside that lock:
//! [`ClientBase::close`] never waits for an in-flight call.  It fires the
//! transport's [`CloseHandle`], which makes the blocked read fail; the call
//! then closes the protocol on its way out.
//!
//! Any transport or protocol failure is fatal, and so is a panic inside a
//! call's own encode or decode code: the dispatcher moves to `Closed`, the
//! listener is told once, and every later call fails fast with
//! [`ClientError::DispatcherClosed`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};

use rpcwire_core::{
    CloseHandle, MessageHeader, MessageKind, Protocol, ProtocolError, SequenceCounter,
    TransportError,
};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, trace, warn};

use super::pending::{PendingCall, PendingCalls};
use crate::domain::{ClientError, ClientListener, MethodCall, ReplyingCall, ServiceMethodCallback};

/// Lifecycle of a [`ClientBase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Accepting calls.
    Open,
    /// `close()` is shutting the transport down.
    Closing,
    /// No further calls will touch the transport.
    Closed,
}

/// Everything guarded by the connection lock.
struct Connection {
    protocol: Box<dyn Protocol>,
    sequence: SequenceCounter,
    pending: PendingCalls,
}

impl Connection {
    fn allocate_seq(&mut self) -> Result<i32, ClientError> {
        let pending = &self.pending;
        self.sequence
            .next_free(|id| pending.contains(id))
            .ok_or_else(|| {
                ClientError::Protocol(ProtocolError::InvalidData(
                    "every sequence id is in use".into(),
                ))
            })
    }

    /// Writes one request message and flushes it.
    fn send(
        protocol: &mut dyn Protocol,
        kind: MessageKind,
        seq_id: i32,
        call: &dyn MethodCall,
    ) -> Result<(), ProtocolError> {
        protocol.write_message_begin(&MessageHeader::new(call.name(), kind, seq_id))?;
        call.write_arguments(protocol)?;
        protocol.write_message_end()?;
        protocol.flush()
    }

    /// Sends the call registered under `seq_id` and reads its reply.
    ///
    /// On `Ok` the entry holds its outcome; on `Err` the connection is no
    /// longer usable.  The entry stays registered either way.
    fn exchange(&mut self, seq_id: i32) -> Result<(), ClientError> {
        let entry = self
            .pending
            .get_mut(seq_id)
            .ok_or(ClientError::Cancelled)?;
        let method = entry.request().name().to_string();

        Self::send(self.protocol.as_mut(), MessageKind::Call, seq_id, entry.request())?;
        trace!(method = %method, seq_id, "request flushed, awaiting reply");

        let header = self.protocol.read_message_begin()?;
        if header.seq_id != seq_id {
            return Err(ProtocolError::BadSequenceId {
                expected: seq_id,
                received: header.seq_id,
            }
            .into());
        }
        if header.name != method {
            return Err(ProtocolError::WrongMethodName {
                expected: method,
                received: header.name,
            }
            .into());
        }
        if matches!(header.kind, MessageKind::Call | MessageKind::Oneway) {
            return Err(ProtocolError::UnexpectedMessageKind(header.kind).into());
        }

        entry.read_reply(self.protocol.as_mut(), &header)
    }
}

/// Runs the part of a call that executes its encode/decode code, turning a
/// panic there into [`ClientError::CodecPanic`].
fn guarded<T>(
    method: &str,
    section: impl FnOnce() -> Result<T, ClientError>,
) -> Result<T, ClientError> {
    panic::catch_unwind(AssertUnwindSafe(section)).unwrap_or_else(|payload| {
        Err(ClientError::CodecPanic {
            method: method.to_string(),
            message: panic_message(&*payload),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// State shared between a [`ClientBase`] and its in-flight blocking tasks.
struct Shared {
    connection: Mutex<Connection>,
    state: std::sync::Mutex<DispatcherState>,
    listener: Arc<dyn ClientListener>,
    close_handle: CloseHandle,
    /// Set once either listener hook has fired.
    notified: AtomicBool,
    /// Mirror of the pending-table size, readable without the connection lock.
    pending_len: AtomicUsize,
}

impl Shared {
    fn state(&self) -> DispatcherState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self) -> bool {
        self.state() == DispatcherState::Open
    }

    fn notify_closed(&self) {
        if !self.notified.swap(true, Ordering::SeqCst) {
            debug!("notifying listener: transport closed");
            self.listener.on_transport_closed();
        }
    }

    fn notify_error(&self, error: &ClientError) {
        if !self.notified.swap(true, Ordering::SeqCst) {
            debug!("notifying listener: {error}");
            self.listener.on_error(error);
        }
    }

    /// Marks the connection dead after a fatal call failure.
    fn connection_failed(&self, error: &ClientError) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, DispatcherState::Closed)
        };
        if previous != DispatcherState::Open {
            // close() owns the notification for a connection it is shutting down.
            return;
        }
        warn!("connection failed: {error}");
        if error.is_closed() {
            self.notify_closed();
        } else {
            self.notify_error(error);
        }
    }

    /// Records a call's result on the connection before the lock is released.
    ///
    /// Also closes the protocol once the dispatcher is no longer open, which
    /// covers a `close()` that could not take the lock while this call ran.
    fn settle(&self, conn: &mut Connection, result: &Result<(), ClientError>) {
        if let Err(err) = result {
            self.connection_failed(err);
        }
        if !self.is_open() {
            conn.protocol.close();
        }
    }

    fn dispatch<C, B>(&self, call: C, callback: B)
    where
        C: ReplyingCall,
        B: ServiceMethodCallback<C::Output>,
    {
        let mut guard = self.connection.blocking_lock();
        if !self.is_open() {
            drop(guard);
            callback.on_error(ClientError::DispatcherClosed);
            return;
        }
        let conn = &mut *guard;

        let seq_id = match conn.allocate_seq() {
            Ok(seq_id) => seq_id,
            Err(err) => {
                drop(guard);
                callback.on_error(err);
                return;
            }
        };
        let method = call.name().to_string();
        debug!(method = %method, seq_id, "dispatching call");
        conn.pending
            .insert(seq_id, Box::new(PendingCall::new(call, callback)));
        self.pending_len.store(conn.pending.len(), Ordering::SeqCst);

        let result = guarded(&method, || conn.exchange(seq_id));
        let entry = conn.pending.remove(seq_id);
        self.pending_len.store(conn.pending.len(), Ordering::SeqCst);
        self.settle(conn, &result);
        drop(guard);

        match (result, entry) {
            (Ok(()), Some(entry)) => {
                trace!(seq_id, "reply delivered");
                entry.finish();
            }
            (Err(err), Some(entry)) => entry.fail(err),
            // close() drained the table; it already failed the callback.
            (_, None) => {}
        }
    }

    fn dispatch_oneway<C, B>(&self, call: C, callback: B)
    where
        C: MethodCall,
        B: ServiceMethodCallback<()>,
    {
        let mut guard = self.connection.blocking_lock();
        if !self.is_open() {
            drop(guard);
            callback.on_error(ClientError::DispatcherClosed);
            return;
        }
        let conn = &mut *guard;

        let sent = conn.allocate_seq().and_then(|seq_id| {
            debug!(method = call.name(), seq_id, "sending oneway call");
            guarded(call.name(), || {
                Connection::send(conn.protocol.as_mut(), MessageKind::Oneway, seq_id, &call)
                    .map_err(ClientError::from)
            })
        });
        self.settle(conn, &sent);
        drop(guard);

        match sent {
            Ok(()) => callback.on_success(()),
            Err(err) => callback.on_error(err),
        }
    }
}

/// An asynchronous client over one protocol/transport pair.
///
/// `ClientBase` is a cheap handle; clones share the same connection.
/// Generated service clients wrap it and expose one async method per
/// remote method.
///
/// Calls run on tokio's blocking pool.  Dispatching outside a runtime fails
/// the call with [`ClientError::NoRuntime`] and leaves the client open.
#[derive(Clone)]
pub struct ClientBase {
    shared: Arc<Shared>,
}

impl ClientBase {
    /// Creates a client over a connected protocol.
    pub fn new(protocol: impl Protocol + 'static, listener: Arc<dyn ClientListener>) -> Self {
        Self::from_boxed(Box::new(protocol), listener)
    }

    /// Creates a client over an already boxed protocol, as returned by
    /// [`ClientConfig::connect`](crate::infrastructure::config::ClientConfig::connect).
    pub fn from_boxed(protocol: Box<dyn Protocol>, listener: Arc<dyn ClientListener>) -> Self {
        let close_handle = protocol.close_handle();
        Self {
            shared: Arc::new(Shared {
                connection: Mutex::new(Connection {
                    protocol,
                    sequence: SequenceCounter::new(),
                    pending: PendingCalls::default(),
                }),
                state: std::sync::Mutex::new(DispatcherState::Open),
                listener,
                close_handle,
                notified: AtomicBool::new(false),
                pending_len: AtomicUsize::new(0),
            }),
        }
    }

    /// Invokes a two-way call and waits for its outcome.
    pub async fn call<C: ReplyingCall>(&self, call: C) -> Result<C::Output, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(call, tx);
        rx.await.unwrap_or(Err(ClientError::Cancelled))
    }

    /// Sends a oneway call.  Completes once the request is flushed.
    pub async fn notify<C: MethodCall>(&self, call: C) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue_oneway(call, tx);
        rx.await.unwrap_or(Err(ClientError::Cancelled))
    }

    /// Dispatches a two-way call; its outcome is delivered to `callback`.
    ///
    /// Returns immediately.  If the client is not open the callback fails
    /// with [`ClientError::DispatcherClosed`] before this returns.
    pub fn enqueue<C, B>(&self, call: C, callback: B)
    where
        C: ReplyingCall,
        B: ServiceMethodCallback<C::Output>,
    {
        if !self.shared.is_open() {
            callback.on_error(ClientError::DispatcherClosed);
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(method = call.name(), "call dispatched outside a tokio runtime");
            callback.on_error(ClientError::NoRuntime);
            return;
        };
        let shared = Arc::clone(&self.shared);
        runtime.spawn_blocking(move || shared.dispatch(call, callback));
    }

    /// Dispatches a oneway call; `callback` learns whether it was sent.
    pub fn enqueue_oneway<C, B>(&self, call: C, callback: B)
    where
        C: MethodCall,
        B: ServiceMethodCallback<()>,
    {
        if !self.shared.is_open() {
            callback.on_error(ClientError::DispatcherClosed);
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(method = call.name(), "oneway call dispatched outside a tokio runtime");
            callback.on_error(ClientError::NoRuntime);
            return;
        };
        let shared = Arc::clone(&self.shared);
        runtime.spawn_blocking(move || shared.dispatch_oneway(call, callback));
    }

    /// Closes the client.  Idempotent.
    ///
    /// Shuts the transport down, which fails an in-flight call with a
    /// transport `Closed` error, and fires `on_transport_closed` once.
    pub fn close(&self) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *state != DispatcherState::Open {
                return;
            }
            *state = DispatcherState::Closing;
        }
        info!("closing client");

        self.shared.close_handle.close();
        // An in-flight call holds the lock; it fails its own entry and closes
        // the protocol once the close signal reaches its blocked read.
        if let Ok(mut conn) = self.shared.connection.try_lock() {
            for entry in conn.pending.drain() {
                entry.fail(ClientError::Transport(TransportError::Closed));
            }
            self.shared.pending_len.store(0, Ordering::SeqCst);
            conn.protocol.close();
        }
        self.shared.notify_closed();

        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = DispatcherState::Closed;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        self.shared.state()
    }

    /// Returns `true` while calls are accepted.
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Number of calls registered and awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending_len.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ClientBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBase")
            .field("state", &self.state())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
