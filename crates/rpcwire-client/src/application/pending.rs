//! The pending-call table: sequence id → call awaiting its reply.
//!
//! An entry owns both the call (needed to write the request and to read the
//! typed result) and the callback.  Once an entry is removed it is consumed
//! by exactly one of [`PendingReply::finish`] or [`PendingReply::fail`], so
//! every registered call observes exactly one terminal event.

use std::collections::HashMap;

use rpcwire_core::{
    ApplicationException, Decode, MessageHeader, MessageKind, Protocol, ProtocolError,
};

use crate::domain::{ClientError, MethodCall, ReplyingCall, ServiceMethodCallback};

/// A type-erased pending call.
pub(crate) trait PendingReply: Send {
    /// The call this entry was registered for.
    fn request(&self) -> &dyn MethodCall;

    /// Reads the reply body for a validated `Reply` or `Exception` header.
    ///
    /// Business outcomes are stored for [`finish`](Self::finish); an `Err`
    /// is a decode failure that is fatal to the connection.
    fn read_reply(
        &mut self,
        protocol: &mut dyn Protocol,
        header: &MessageHeader,
    ) -> Result<(), ClientError>;

    /// Delivers the stored outcome.
    fn finish(self: Box<Self>);

    /// Delivers `error` instead of any stored outcome.
    fn fail(self: Box<Self>, error: ClientError);
}

/// A two-way call together with the callback awaiting its outcome.
pub(crate) struct PendingCall<C: ReplyingCall, B> {
    call: C,
    callback: B,
    outcome: Option<Result<C::Output, ClientError>>,
}

impl<C, B> PendingCall<C, B>
where
    C: ReplyingCall,
    B: ServiceMethodCallback<C::Output>,
{
    pub(crate) fn new(call: C, callback: B) -> Self {
        Self {
            call,
            callback,
            outcome: None,
        }
    }
}

impl<C, B> PendingReply for PendingCall<C, B>
where
    C: ReplyingCall,
    B: ServiceMethodCallback<C::Output>,
{
    fn request(&self) -> &dyn MethodCall {
        &self.call
    }

    fn read_reply(
        &mut self,
        protocol: &mut dyn Protocol,
        header: &MessageHeader,
    ) -> Result<(), ClientError> {
        let outcome = match header.kind {
            MessageKind::Exception => Err(ClientError::Application(ApplicationException::read(
                protocol,
            )?)),
            MessageKind::Reply => match self.call.read_result(protocol) {
                Ok(value) => Ok(value),
                Err(err) if err.is_application() => Err(err),
                Err(err) => return Err(err),
            },
            kind => return Err(ProtocolError::UnexpectedMessageKind(kind).into()),
        };
        protocol.read_message_end()?;
        self.outcome = Some(outcome);
        Ok(())
    }

    fn finish(self: Box<Self>) {
        let this = *self;
        match this.outcome {
            Some(Ok(value)) => this.callback.on_success(value),
            Some(Err(err)) => this.callback.on_error(err),
            None => this.callback.on_error(ClientError::Cancelled),
        }
    }

    fn fail(self: Box<Self>, error: ClientError) {
        self.callback.on_error(error);
    }
}

/// Calls awaiting a reply, keyed by sequence id.
#[derive(Default)]
pub(crate) struct PendingCalls {
    entries: HashMap<i32, Box<dyn PendingReply>>,
}

impl PendingCalls {
    pub(crate) fn insert(&mut self, seq_id: i32, entry: Box<dyn PendingReply>) {
        self.entries.insert(seq_id, entry);
    }

    pub(crate) fn get_mut(&mut self, seq_id: i32) -> Option<&mut Box<dyn PendingReply>> {
        self.entries.get_mut(&seq_id)
    }

    pub(crate) fn remove(&mut self, seq_id: i32) -> Option<Box<dyn PendingReply>> {
        self.entries.remove(&seq_id)
    }

    pub(crate) fn contains(&self, seq_id: i32) -> bool {
        self.entries.contains_key(&seq_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes and returns every entry.
    pub(crate) fn drain(&mut self) -> Vec<Box<dyn PendingReply>> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcwire_core::{
        read_struct, write_struct, ApplicationExceptionKind, BinaryProtocol, BufferTransport,
        Encode, TType, WireValue,
    };
    use tokio::sync::oneshot;

    /// `double(i32) -> i32`; the reply result struct holds field 0.
    struct DoubleCall(i32);

    impl MethodCall for DoubleCall {
        fn name(&self) -> &str {
            "double"
        }

        fn write_arguments(&self, protocol: &mut dyn Protocol) -> Result<(), ProtocolError> {
            write_struct(protocol, "double_args", |p| {
                rpcwire_core::write_field(p, "value", 1, &self.0)
            })
        }
    }

    impl ReplyingCall for DoubleCall {
        type Output = i32;

        fn read_result(&self, protocol: &mut dyn Protocol) -> Result<i32, ClientError> {
            let mut success = None;
            read_struct(protocol, |p, field| {
                if field.id == 0 && field.ttype == TType::I32 {
                    success = Some(i32::read_value(p)?);
                    return Ok(true);
                }
                Ok(false)
            })?;
            success.ok_or_else(|| {
                ApplicationException::new(ApplicationExceptionKind::MissingResult, "double").into()
            })
        }
    }

    fn reply_body(write: impl FnOnce(&mut dyn Protocol)) -> BinaryProtocol<BufferTransport> {
        let mut writer = BinaryProtocol::new(BufferTransport::new());
        write(&mut writer);
        BinaryProtocol::new(BufferTransport::from_bytes(writer.into_transport().into_bytes()))
    }

    fn header(kind: MessageKind) -> MessageHeader {
        MessageHeader::new("double", kind, 1)
    }

    #[test]
    fn test_reply_outcome_is_delivered_on_finish() {
        // Arrange
        let (tx, mut rx) = oneshot::channel::<Result<i32, ClientError>>();
        let mut entry: Box<dyn PendingReply> = Box::new(PendingCall::new(DoubleCall(4), tx));
        let mut body = reply_body(|p| {
            write_struct(p, "double_result", |p| rpcwire_core::write_field(p, "success", 0, &8i32))
                .unwrap()
        });

        // Act
        entry.read_reply(&mut body, &header(MessageKind::Reply)).unwrap();
        assert!(rx.try_recv().is_err(), "nothing is delivered before finish");
        entry.finish();

        // Assert
        assert!(matches!(rx.try_recv(), Ok(Ok(8))));
    }

    #[test]
    fn test_exception_message_becomes_application_error() {
        let (tx, mut rx) = oneshot::channel::<Result<i32, ClientError>>();
        let mut entry: Box<dyn PendingReply> = Box::new(PendingCall::new(DoubleCall(4), tx));
        let mut body = reply_body(|p| {
            ApplicationException::new(ApplicationExceptionKind::UnknownMethod, "double")
                .write(p)
                .unwrap()
        });

        entry.read_reply(&mut body, &header(MessageKind::Exception)).unwrap();
        entry.finish();

        match rx.try_recv() {
            Ok(Err(ClientError::Application(exc))) => {
                assert_eq!(exc.kind, ApplicationExceptionKind::UnknownMethod)
            }
            other => panic!("expected application error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_result_struct_is_missing_result() {
        let (tx, mut rx) = oneshot::channel::<Result<i32, ClientError>>();
        let mut entry: Box<dyn PendingReply> = Box::new(PendingCall::new(DoubleCall(4), tx));
        let mut body = reply_body(|p| write_struct(p, "double_result", |_| Ok(())).unwrap());

        entry.read_reply(&mut body, &header(MessageKind::Reply)).unwrap();
        entry.finish();

        match rx.try_recv() {
            Ok(Err(ClientError::Application(exc))) => {
                assert_eq!(exc.kind, ApplicationExceptionKind::MissingResult)
            }
            other => panic!("expected MissingResult, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_failure_is_returned_not_stored() {
        // Arrange – a truncated result struct
        let (tx, mut rx) = oneshot::channel::<Result<i32, ClientError>>();
        let mut entry: Box<dyn PendingReply> = Box::new(PendingCall::new(DoubleCall(4), tx));
        let mut body = BinaryProtocol::new(BufferTransport::from_bytes(vec![TType::I32 as u8, 0]));

        // Act
        let result = entry.read_reply(&mut body, &header(MessageKind::Reply));
        entry.fail(ClientError::DispatcherClosed);

        // Assert
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert!(matches!(rx.try_recv(), Ok(Err(ClientError::DispatcherClosed))));
    }

    #[test]
    fn test_call_kind_in_reply_is_rejected() {
        let (tx, _rx) = oneshot::channel::<Result<i32, ClientError>>();
        let mut entry = PendingCall::new(DoubleCall(1), tx);
        let mut body = BinaryProtocol::new(BufferTransport::new());

        let result = entry.read_reply(&mut body, &header(MessageKind::Call));

        assert!(matches!(
            result,
            Err(ClientError::Protocol(ProtocolError::UnexpectedMessageKind(
                MessageKind::Call
            )))
        ));
    }

    #[test]
    fn test_table_bookkeeping() {
        let mut table = PendingCalls::default();
        let (tx, _rx) = oneshot::channel::<Result<i32, ClientError>>();
        table.insert(3, Box::new(PendingCall::new(DoubleCall(1), tx)));

        assert!(table.contains(3));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get_mut(3).map(|e| e.request().name().to_string()).as_deref(), Some("double"));
        assert_eq!(table.drain().len(), 1);
        assert_eq!(table.len(), 0);
        assert!(table.remove(3).is_none());
    }
}
