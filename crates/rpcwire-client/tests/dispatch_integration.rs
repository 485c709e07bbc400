//! End-to-end tests: a `ConformanceClient` talking to an in-process peer over
//! real TCP sockets.
//!
//! The peer runs on a plain thread with its own runtime and answers with
//! `StructValue`s, so it shares no code with the typed client beyond the wire
//! codec.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use mockall::mock;
use rpcwire_client::conformance::calls::EchoCall;
use rpcwire_client::conformance::{ConformanceClient, Xception, Xtruct, Xtruct2};
use rpcwire_client::infrastructure::ClientConfig;
use rpcwire_client::{ClientBase, ClientError, ClientListener, DispatcherState, FnCallback};
use rpcwire_core::{
    ApplicationException, ApplicationExceptionKind, BinaryProtocol, Decode, Encode,
    FramedTransport, MessageHeader, MessageKind, Protocol, ProtocolError, SocketTransport,
    StructValue, Value,
};

mock! {
    Listener {}

    impl ClientListener for Listener {
        fn on_transport_closed(&self);
        fn on_error(&self, error: &ClientError);
    }
}

/// Counts hook invocations so tests can assert on them mid-test.
#[derive(Default)]
struct CountingListener {
    closed: AtomicUsize,
    errors: AtomicUsize,
}

impl CountingListener {
    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl ClientListener for CountingListener {
    fn on_transport_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &ClientError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

// ── In-process peer ───────────────────────────────────────────────────────────

/// What the peer does after reading one request.
enum Step {
    Continue,
    Hangup,
}

/// Accepts one connection and feeds every request to `handler`.
///
/// The peer owns a small runtime of its own on a plain thread, so it keeps
/// serving independently of the test's runtime.
fn spawn_peer<H>(framed: bool, handler: H) -> u16
where
    H: FnMut(&mut dyn Protocol, &MessageHeader, StructValue) -> Step + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let socket = runtime.block_on(async move {
            listener.set_nonblocking(true).unwrap();
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            SocketTransport::accepted(stream, Duration::from_secs(5)).unwrap()
        });
        serve(socket, framed, handler);
    });

    port
}

fn serve<H>(socket: SocketTransport, framed: bool, mut handler: H)
where
    H: FnMut(&mut dyn Protocol, &MessageHeader, StructValue) -> Step,
{
    let mut protocol: Box<dyn Protocol> = if framed {
        Box::new(BinaryProtocol::new(FramedTransport::new(socket)))
    } else {
        Box::new(BinaryProtocol::new(socket))
    };

    loop {
        let Ok(header) = protocol.read_message_begin() else {
            break;
        };
        let Ok(args) = StructValue::read(protocol.as_mut()) else {
            break;
        };
        if protocol.read_message_end().is_err() {
            break;
        }
        if let Step::Hangup = handler(protocol.as_mut(), &header, args) {
            break;
        }
    }
    protocol.close();
}

fn write_reply(
    protocol: &mut dyn Protocol,
    header: &MessageHeader,
    seq_id: i32,
    result: &StructValue,
) -> Result<(), ProtocolError> {
    protocol.write_message_begin(&MessageHeader::new(
        header.name.clone(),
        MessageKind::Reply,
        seq_id,
    ))?;
    result.write(protocol)?;
    protocol.write_message_end()?;
    protocol.flush()
}

fn write_exception(
    protocol: &mut dyn Protocol,
    header: &MessageHeader,
    exception: &ApplicationException,
) -> Result<(), ProtocolError> {
    protocol.write_message_begin(&MessageHeader::new(
        header.name.clone(),
        MessageKind::Exception,
        header.seq_id,
    ))?;
    exception.write(protocol)?;
    protocol.write_message_end()?;
    protocol.flush()
}

/// Behaves like a conforming conformance-service peer for the methods the
/// tests use.
fn conformance_handler(protocol: &mut dyn Protocol, header: &MessageHeader, args: StructValue) -> Step {
    if header.kind == MessageKind::Oneway {
        return Step::Continue;
    }

    let written = match header.name.as_str() {
        "testException" => match args.get(1).and_then(Value::as_str) {
            Some("Xception") => {
                let thrown = StructValue::new()
                    .with(1, Value::I32(1001))
                    .with(2, Value::string("Xception"));
                let result = StructValue::new().with(1, Value::Struct(thrown));
                write_reply(protocol, header, header.seq_id, &result)
            }
            Some("TException") => write_exception(
                protocol,
                header,
                &ApplicationException::new(ApplicationExceptionKind::InternalError, "TException"),
            ),
            _ => write_reply(protocol, header, header.seq_id, &StructValue::new()),
        },
        "testVoid" => write_reply(protocol, header, header.seq_id, &StructValue::new()),
        _ => {
            let mut result = StructValue::new();
            if let Some(thing) = args.get(1) {
                result = result.with(0, thing.clone());
            }
            write_reply(protocol, header, header.seq_id, &result)
        }
    };

    match written {
        Ok(()) => Step::Continue,
        Err(_) => Step::Hangup,
    }
}

fn config_for(port: u16, read_timeout_ms: u64, framed: bool) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.connection.host = "127.0.0.1".to_string();
    config.connection.port = port;
    config.connection.read_timeout_ms = read_timeout_ms;
    config.connection.framed = framed;
    config
}

async fn connect(
    port: u16,
    read_timeout_ms: u64,
    listener: Arc<dyn ClientListener>,
) -> ConformanceClient {
    let protocol = config_for(port, read_timeout_ms, false)
        .connect()
        .await
        .unwrap();
    ConformanceClient::new(ClientBase::from_boxed(protocol, listener))
}

fn sample_xtruct() -> Xtruct {
    Xtruct {
        string_thing: Some("foo".into()),
        byte_thing: Some(1),
        i32_thing: Some(2),
        i64_thing: Some(3),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_struct_and_nest_round_trip_over_tcp() {
    // Arrange
    let port = spawn_peer(false, conformance_handler);
    let listener = Arc::new(CountingListener::default());
    let client = connect(port, 2_000, listener.clone()).await;
    let xtruct = sample_xtruct();
    let nest = Xtruct2 {
        byte_thing: Some(4),
        struct_thing: Some(xtruct.clone()),
        i32_thing: Some(5),
    };

    // Act
    let echoed_struct = client.test_struct(xtruct.clone()).await.unwrap();
    let echoed_nest = client.test_nest(nest.clone()).await.unwrap();

    // Assert
    assert_eq!(echoed_struct, xtruct);
    assert_eq!(echoed_nest, nest);
    assert_eq!(client.base().pending_calls(), 0);
    assert_eq!(listener.errors(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_containers_and_scalars_round_trip() {
    let port = spawn_peer(false, conformance_handler);
    let client = connect(port, 2_000, Arc::new(CountingListener::default())).await;

    assert_eq!(client.test_string("hello").await.unwrap(), "hello");
    assert_eq!(client.test_byte(-7).await.unwrap(), -7);
    assert_eq!(client.test_i64(i64::MIN).await.unwrap(), i64::MIN);
    assert_eq!(client.test_double(1.5).await.unwrap(), 1.5);
    let map = [(1, -1), (2, -2)].into_iter().collect();
    assert_eq!(client.test_map(map).await.unwrap().len(), 2);
    let set = [3, 1, 2].into_iter().collect();
    assert_eq!(client.test_set(set).await.unwrap().len(), 3);
    assert_eq!(client.test_list(vec![]).await.unwrap(), Vec::<i32>::new());
    client.test_void().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_calls_each_receive_their_own_reply() {
    // Arrange
    let port = spawn_peer(false, conformance_handler);
    let client = connect(port, 2_000, Arc::new(CountingListener::default())).await;

    // Act
    let (a, b) = tokio::join!(client.test_i32(111), client.test_string("bbb"));

    // Assert
    assert_eq!(a.unwrap(), 111);
    assert_eq!(b.unwrap(), "bbb");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_framed_transport_round_trip() {
    let port = spawn_peer(true, conformance_handler);
    let protocol = config_for(port, 2_000, true).connect().await.unwrap();
    let client = ConformanceClient::new(ClientBase::from_boxed(
        protocol,
        Arc::new(CountingListener::default()),
    ));

    let echoed = client.test_struct(sample_xtruct()).await.unwrap();

    assert_eq!(echoed, sample_xtruct());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_oneway_leaves_no_pending_entry() {
    // Arrange
    let port = spawn_peer(false, conformance_handler);
    let client = connect(port, 2_000, Arc::new(CountingListener::default())).await;

    // Act
    client.test_oneway(1).await.unwrap();

    // Assert – the connection still pairs the next reply correctly
    assert_eq!(client.base().pending_calls(), 0);
    assert_eq!(client.test_i32(9).await.unwrap(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exceptions_are_business_outcomes() {
    // Arrange
    let port = spawn_peer(false, conformance_handler);
    let listener = Arc::new(CountingListener::default());
    let client = connect(port, 2_000, listener.clone()).await;

    // Act
    let declared = client.test_exception("Xception").await.unwrap_err();
    let application = client.test_exception("TException").await.unwrap_err();
    let normal = client.test_exception("fine").await;

    // Assert
    let xception = declared.service_exception::<Xception>().unwrap();
    assert_eq!(xception.error_code, Some(1001));
    assert_eq!(xception.message.as_deref(), Some("Xception"));
    match application {
        ClientError::Application(exc) => {
            assert_eq!(exc.kind, ApplicationExceptionKind::InternalError);
            assert_eq!(exc.message.as_deref(), Some("TException"));
        }
        other => panic!("expected application exception, got {other:?}"),
    }
    assert!(normal.is_ok());
    assert!(client.base().is_open());
    assert_eq!(listener.errors() + listener.closed(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_timeout_fails_call_and_later_calls_fail_fast() {
    // Arrange – the peer reads requests but never answers
    let port = spawn_peer(false, |_, _, _| Step::Continue);
    let listener = Arc::new(CountingListener::default());
    let client = connect(port, 200, listener.clone()).await;

    // Act
    let err = client.test_i32(1).await.unwrap_err();

    // Assert
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(client.base().pending_calls(), 0);
    assert_eq!(client.base().state(), DispatcherState::Closed);
    assert_eq!(listener.errors(), 1);
    assert_eq!(listener.closed(), 0);
    assert!(matches!(
        client.test_i32(2).await,
        Err(ClientError::DispatcherClosed)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_during_call_fails_it_and_notifies_once() {
    // Arrange
    let port = spawn_peer(false, |_, _, _| Step::Continue);
    let listener = Arc::new(CountingListener::default());
    let client = connect(port, 5_000, listener.clone()).await;
    let in_flight = {
        let client = client.clone();
        tokio::spawn(async move { client.test_i32(1).await })
    };
    // Wait until the request is registered and holds the connection.
    while client.base().pending_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Act
    client.close();
    let result = in_flight.await.unwrap();

    // Assert
    let err = result.unwrap_err();
    assert!(err.is_closed(), "unexpected error: {err}");
    assert_eq!(listener.closed(), 1);
    assert_eq!(listener.errors(), 0);
    assert_eq!(client.base().pending_calls(), 0);
    assert!(matches!(
        client.test_void().await,
        Err(ClientError::DispatcherClosed)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sequence_mismatch_fails_connection_with_protocol_error() {
    // Arrange – replies carry the wrong sequence id
    let port = spawn_peer(false, |protocol, header, _| {
        match write_reply(protocol, header, header.seq_id + 100, &StructValue::new()) {
            Ok(()) => Step::Continue,
            Err(_) => Step::Hangup,
        }
    });
    let mut mock = MockListener::new();
    mock.expect_on_error()
        .withf(|err| matches!(err, ClientError::Protocol(ProtocolError::BadSequenceId { .. })))
        .times(1)
        .return_const(());
    mock.expect_on_transport_closed().times(0);
    let client = connect(port, 2_000, Arc::new(mock)).await;

    // Act
    let err = client.test_i32(5).await.unwrap_err();

    // Assert
    assert!(matches!(
        err,
        ClientError::Protocol(ProtocolError::BadSequenceId { .. })
    ));
    assert!(!err.is_application());
    assert_eq!(client.base().state(), DispatcherState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_peer_hangup_reports_transport_closed() {
    // Arrange
    let port = spawn_peer(false, |_, _, _| Step::Hangup);
    let mut mock = MockListener::new();
    mock.expect_on_transport_closed().times(1).return_const(());
    mock.expect_on_error().times(0);
    let client = connect(port, 2_000, Arc::new(mock)).await;

    // Act
    let err = client.test_string("anyone there?").await.unwrap_err();

    // Assert
    assert!(err.is_closed(), "unexpected error: {err}");
    assert!(!client.base().is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_enqueue_delivers_through_closure_callback() {
    // Arrange
    let port = spawn_peer(false, conformance_handler);
    let client = connect(port, 2_000, Arc::new(CountingListener::default())).await;
    let (tx, rx) = mpsc::channel();

    // Act
    client.base().enqueue(
        EchoCall::new("testI64", 64i64),
        FnCallback(move |result: Result<i64, ClientError>| {
            let _ = tx.send(result);
        }),
    );
    let outcome = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(outcome.unwrap(), 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_to_unserved_port_fails_before_any_call() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = config_for(port, 2_000, false).connect().await;

    assert!(matches!(
        result,
        Err(rpcwire_core::TransportError::Connect { .. })
    ));
}
